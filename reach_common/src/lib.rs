//! Reach Common Library
//!
//! Shared types for the reach workspace: the arm [`ArmConfig`] snapshot that
//! every solve consumes, the servo calibration data, and TOML loading of the
//! application configuration.
//!
//! # Module Structure
//!
//! - [`arm`] - Arm parameters, metadata and the derived rod ratio
//! - [`calibration`] - Servo maps and joint angle limits
//! - [`config`] - Configuration loading traits and application config
//! - [`consts`] - Window, display and grid constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use reach_common::prelude::*;
//!
//! let mut arm = ArmConfig::default();
//! arm.set(ParamId::RodRatio, 1.2).unwrap();
//! assert!((arm.linkage_length - 1.2 * arm.elevator_length).abs() < 1e-9);
//! ```

pub mod arm;
pub mod calibration;
pub mod config;
pub mod consts;
pub mod prelude;

pub use arm::{ArmConfig, ParamError, ParamId, ParamMeta};
pub use calibration::{AngleRange, CalibrationError, ServoCalibration, ServoMap};
