//! # Reach Solver
//!
//! Pure geometry and statics for the parallel-linkage arm. Given an
//! [`ArmConfig`](reach_common::ArmConfig) the solver either evaluates a
//! single goal point or a whole grid of goals, classifying each against the
//! mechanical limits and computing how much load the arm can hold there.
//!
//! ## Pipeline (per goal)
//!
//! 1. Two-circle intersection gives the elbow ([`geometry`]).
//! 2. Signed joint angles from vertical, servo mapping, elbow angle.
//! 3. Law of cosines across the linkage quadrilateral gives the base and
//!    actuator angles ([`kinematics`]).
//! 4. Five range checks, combined as [`Constraints`] bits.
//! 5. Static equilibrium gives the load capacity ([`statics`]).
//!
//! Field mode adds boundary extraction ([`contour`]) over the valid mask.
//!
//! The solver holds no state between calls; equal inputs give equal
//! results.

pub mod constraints;
pub mod contour;
pub mod field;
pub mod geometry;
pub mod kinematics;
pub mod point;
pub mod solve;
pub mod statics;

pub use constraints::Constraints;
pub use contour::Contour;
pub use field::{FieldGrid, FieldResult};
pub use point::{ForceVectors, PointResult};
pub use solve::{SolveMode, SolveResult, Solver, solve};

/// Re-export so callers need not depend on glam directly.
pub use glam::DVec2;
