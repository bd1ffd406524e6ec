//! Configuration loading traits and the application config document.
//!
//! The sweep binary reads one TOML file:
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "reach-sweep"
//!
//! [arm]
//! elevator_length = 148.4
//! forearm_length = 160.0
//!
//! [calibration.elevator]
//! sign = -1.0
//! offset_deg = 178.21
//!
//! [sweep]
//! resolution = 200
//! parameters = ["elevator_length", "forearm_length", "rod_ratio"]
//! focus = "elevator_length"
//!
//! [pool]
//! workers = 0
//! ```
//!
//! Every table is optional; omitted keys take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::arm::{ArmConfig, ParamId};
use crate::calibration::ServoCalibration;
use crate::consts::{
    DEFAULT_REFRESH_TICKS, DEFAULT_RESOLUTION, DEFAULT_STEP_RATIO, DEFAULT_TICK_MS, MAX_DISPLAYS,
    MAX_RINGS, RESOLUTION_MAX, RESOLUTION_MIN, STEP_RATIO_MAX, STEP_RATIO_MIN, TICK_MS_MAX,
    TICK_MS_MIN,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// Reading or TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Fields common to every reach service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Logging verbosity level.
    pub log_level: LogLevel,

    /// Instance identifier used in log lines.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "reach-sweep".to_string(),
        }
    }
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sweep scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Grid width of the focal field solve.
    pub resolution: u32,
    /// Grid width of ghost solves.
    pub ghost_resolution: u32,
    /// Multiplicative offset between neighbouring ghost values.
    pub step_ratio: f64,
    /// Control-loop tick interval [ms].
    pub tick_ms: u64,
    /// Background ring refresh period [ticks].
    pub refresh_ticks: u32,
    /// Parameters that get a ghost ring.
    pub parameters: Vec<ParamId>,
    /// Parameter whose ring owns the display identities at startup.
    pub focus: ParamId,
    /// Number of display identities to latch ghosts onto.
    pub displays: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            ghost_resolution: DEFAULT_RESOLUTION,
            step_ratio: DEFAULT_STEP_RATIO,
            tick_ms: DEFAULT_TICK_MS,
            refresh_ticks: DEFAULT_REFRESH_TICKS,
            parameters: vec![
                ParamId::ElevatorLength,
                ParamId::ForearmLength,
                ParamId::RodRatio,
            ],
            focus: ParamId::ElevatorLength,
            displays: MAX_DISPLAYS,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |msg: String| Err(ConfigError::ValidationError(msg));
        for (name, r) in [
            ("resolution", self.resolution),
            ("ghost_resolution", self.ghost_resolution),
        ] {
            if !(RESOLUTION_MIN..=RESOLUTION_MAX).contains(&r) {
                return err(format!(
                    "{name} {r} out of range [{RESOLUTION_MIN}, {RESOLUTION_MAX}]"
                ));
            }
        }
        if !(self.step_ratio > STEP_RATIO_MIN && self.step_ratio <= STEP_RATIO_MAX) {
            return err(format!(
                "step_ratio {} out of range ({STEP_RATIO_MIN}, {STEP_RATIO_MAX}]",
                self.step_ratio
            ));
        }
        if !(TICK_MS_MIN..=TICK_MS_MAX).contains(&self.tick_ms) {
            return err(format!(
                "tick_ms {} out of range [{TICK_MS_MIN}, {TICK_MS_MAX}]",
                self.tick_ms
            ));
        }
        if self.refresh_ticks == 0 {
            return err("refresh_ticks must be at least 1".to_string());
        }
        if self.parameters.is_empty() || self.parameters.len() > MAX_RINGS {
            return err(format!(
                "parameters must list 1..={MAX_RINGS} entries (got {})",
                self.parameters.len()
            ));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if self.parameters[..i].contains(p) {
                return err(format!("parameter {p} listed twice"));
            }
        }
        if !self.parameters.contains(&self.focus) {
            return err(format!("focus {} is not a swept parameter", self.focus));
        }
        if self.displays > MAX_DISPLAYS {
            return err(format!(
                "displays {} exceeds the limit of {MAX_DISPLAYS}",
                self.displays
            ));
        }
        Ok(())
    }
}

/// Job pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads; 0 selects the available hardware parallelism.
    pub workers: usize,
}

impl PoolConfig {
    /// Worker count with the 0 = auto rule applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub shared: SharedConfig,
    pub arm: ArmConfig,
    pub calibration: ServoCalibration,
    pub sweep: SweepConfig,
    pub pool: PoolConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.arm
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[arm] {e}")))?;
        self.calibration
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[calibration] {e}")))?;
        self.sweep.validate()?;
        // Geometric stepping needs a positive centre value.
        for &param in &self.sweep.parameters {
            let value = self.arm.get(param);
            if !(value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "swept parameter {param} must be positive (got {value})"
                )));
            }
        }
        Ok(())
    }

    /// Load from TOML and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Loading of TOML files into any deserializable type.
///
/// - `ConfigError::FileNotFound` if the file does not exist
/// - `ConfigError::ParseError` if reading fails or TOML is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
