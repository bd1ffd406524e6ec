//! # Reach Sweep Library
//!
//! Keeps ghost outlines of the arm's reachable region warm while a
//! parameter is being dragged.
//!
//! # Module Structure
//!
//! - [`pool`] - Bounded worker pool with keyed supersession
//! - [`request`] - Versioned solve request and output values
//! - [`ring`] - Per-parameter ghost rings and the sliding window
//! - [`display`] - Display identity trait and ghost colouring
//! - [`scheduler`] - Focal slot, rings, latching and completion callbacks
//! - [`runner`] - Fixed-interval tick loop
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        control thread                          │
//! │  on_config_changed ──► SweepScheduler ◄── tick (TickRunner)    │
//! │                          │        │                            │
//! │                 submit/poll       update/set_color/hide/show   │
//! │                          ▼        ▼                            │
//! │                      JobPool    GhostDisplay × ≤6              │
//! └──────────────────────────┬─────────────────────────────────────┘
//!                            │ SolveRequest (owned ArmConfig)
//!                            ▼
//!                  worker threads: reach_solver::Solver
//! ```

pub mod display;
pub mod pool;
pub mod request;
pub mod ring;
pub mod runner;
pub mod scheduler;

pub use display::{GhostColor, GhostDisplay, GhostTone};
pub use pool::{JobHandle, JobPool, JobState, PoolError};
pub use request::{SolveOutput, SolveRequest, SourceKey};
pub use ring::{ParamRing, SolverSlot};
pub use runner::{TickRunner, TickStats};
pub use scheduler::{SchedulerError, SchedulerStats, SweepScheduler, TickOutcome};
