//! Common re-exports.
//!
//! ```rust
//! use reach_common::prelude::*;
//! ```

pub use crate::arm::{ArmConfig, ParamError, ParamId, ParamMeta};
pub use crate::calibration::{AngleRange, CalibrationError, ServoCalibration, ServoMap};
pub use crate::config::{AppConfig, ConfigError, ConfigLoader, LogLevel, PoolConfig, SweepConfig};
pub use crate::consts::{DEFAULT_RESOLUTION, DEFAULT_STEP_RATIO, HALF_WINDOW, MAX_DISPLAYS, RING_SIZE};
