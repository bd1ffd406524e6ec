//! Arm parameters and the derived rod ratio.
//!
//! [`ArmConfig`] is the snapshot every solve consumes. It is `Clone` but not
//! `Copy`: handing a configuration to a worker is always an explicit clone.
//!
//! `rod_ratio` is not stored. Reading it returns `linkage / elevator`;
//! writing it rewrites the linkage. Writing the elevator length keeps the
//! current ratio by rewriting the linkage as well. Both rules live in
//! [`ArmConfig::set`]'s propagation step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for a rejected parameter write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// Value is NaN or infinite.
    #[error("{param}: value {value} is not finite")]
    NotFinite { param: ParamId, value: f64 },

    /// Value lies outside the parameter bounds.
    #[error("{param}: value {value} out of range [{min}, {max}]")]
    OutOfRange {
        param: ParamId,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Name does not match any parameter.
    #[error("unknown parameter: {0}")]
    UnknownName(String),
}

/// Identifier of a tunable arm parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    ElevatorLength,
    ForearmLength,
    LinkageLength,
    LowerActuatorLength,
    UpperActuatorLength,
    WristLength,
    ElevatorWeight,
    ForearmWeight,
    ElevatorTorque,
    ActuatorTorque,
    MinLoad,
    /// Derived: `linkage_length / elevator_length`.
    RodRatio,
}

/// Display and bounds metadata for a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamMeta {
    /// Human readable label.
    pub label: &'static str,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Fixed-point divisor used by integer slider widgets.
    pub divisor: f64,
}

impl ParamMeta {
    /// Whether `value` lies within the bounds.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl ParamId {
    /// Every parameter, in declaration order.
    pub const ALL: [ParamId; 12] = [
        ParamId::ElevatorLength,
        ParamId::ForearmLength,
        ParamId::LinkageLength,
        ParamId::LowerActuatorLength,
        ParamId::UpperActuatorLength,
        ParamId::WristLength,
        ParamId::ElevatorWeight,
        ParamId::ForearmWeight,
        ParamId::ElevatorTorque,
        ParamId::ActuatorTorque,
        ParamId::MinLoad,
        ParamId::RodRatio,
    ];

    /// Metadata for this parameter.
    pub const fn meta(self) -> ParamMeta {
        const fn m(label: &'static str, min: f64, max: f64, divisor: f64) -> ParamMeta {
            ParamMeta {
                label,
                min,
                max,
                divisor,
            }
        }
        match self {
            ParamId::ElevatorLength => m("Elevator Length", 20.0, 800.0, 10.0),
            ParamId::ForearmLength => m("Forearm Length", 20.0, 800.0, 10.0),
            ParamId::LinkageLength => m("Linkage Length", 5.0, 2400.0, 10.0),
            ParamId::LowerActuatorLength => m("Lower Actuator", 5.0, 300.0, 10.0),
            ParamId::UpperActuatorLength => m("Upper Actuator", 5.0, 300.0, 10.0),
            ParamId::WristLength => m("Wrist Length", 0.0, 300.0, 10.0),
            ParamId::ElevatorWeight => m("Elevator Weight", 0.0, 20.0, 100.0),
            ParamId::ForearmWeight => m("Forearm Weight", 0.0, 20.0, 100.0),
            ParamId::ElevatorTorque => m("Elevator Torque", 0.0, 50.0, 10.0),
            ParamId::ActuatorTorque => m("Actuator Torque", 0.0, 50.0, 10.0),
            ParamId::MinLoad => m("Minimum Load", 0.0, 50.0, 10.0),
            ParamId::RodRatio => m("Rod Ratio", 0.33, 3.0, 100.0),
        }
    }

    /// Snake-case name, matching the serde representation.
    pub const fn name(self) -> &'static str {
        match self {
            ParamId::ElevatorLength => "elevator_length",
            ParamId::ForearmLength => "forearm_length",
            ParamId::LinkageLength => "linkage_length",
            ParamId::LowerActuatorLength => "lower_actuator_length",
            ParamId::UpperActuatorLength => "upper_actuator_length",
            ParamId::WristLength => "wrist_length",
            ParamId::ElevatorWeight => "elevator_weight",
            ParamId::ForearmWeight => "forearm_weight",
            ParamId::ElevatorTorque => "elevator_torque",
            ParamId::ActuatorTorque => "actuator_torque",
            ParamId::MinLoad => "min_load",
            ParamId::RodRatio => "rod_ratio",
        }
    }

    /// Whether the value is computed from other parameters.
    #[inline]
    pub const fn is_derived(self) -> bool {
        matches!(self, ParamId::RodRatio)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamId::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ParamError::UnknownName(s.to_string()))
    }
}

/// Arm dimensions, weights and limits.
///
/// Lengths in mm, weights and loads in N, torques in N·m.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub elevator_length: f64,
    pub forearm_length: f64,
    pub linkage_length: f64,
    pub lower_actuator_length: f64,
    pub upper_actuator_length: f64,
    pub wrist_length: f64,
    pub elevator_weight: f64,
    pub forearm_weight: f64,
    pub elevator_torque: f64,
    pub actuator_torque: f64,
    pub min_load: f64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            elevator_length: 148.4,
            forearm_length: 160.0,
            linkage_length: 155.0,
            lower_actuator_length: 65.0,
            upper_actuator_length: 54.4,
            wrist_length: 90.52,
            elevator_weight: 0.6,
            forearm_weight: 0.5,
            elevator_torque: 10.0,
            actuator_torque: 10.0,
            min_load: 1.0,
        }
    }
}

impl ArmConfig {
    /// Linkage-to-elevator length ratio.
    #[inline]
    pub fn rod_ratio(&self) -> f64 {
        self.linkage_length / self.elevator_length
    }

    /// Largest distance the wrist can be from the elevator pivot.
    #[inline]
    pub fn max_reach(&self) -> f64 {
        self.elevator_length + self.forearm_length
    }

    /// Read a parameter (derived ones included).
    pub fn get(&self, param: ParamId) -> f64 {
        match param {
            ParamId::RodRatio => self.rod_ratio(),
            _ => self.stored(param),
        }
    }

    /// Write a parameter, then propagate dependent values.
    ///
    /// The value must be finite and within [`ParamId::meta`] bounds.
    pub fn set(&mut self, param: ParamId, value: f64) -> Result<(), ParamError> {
        check(param, value)?;
        let ratio_before = self.rod_ratio();
        if let Some(slot) = self.field_mut(param) {
            *slot = value;
        }
        self.propagate(param, value, ratio_before);
        Ok(())
    }

    /// Copy of `self` with `param` set to `value`.
    pub fn with(&self, param: ParamId, value: f64) -> Result<Self, ParamError> {
        let mut next = self.clone();
        next.set(param, value)?;
        Ok(next)
    }

    /// Check every stored parameter and the derived ratio against bounds.
    pub fn validate(&self) -> Result<(), ParamError> {
        for param in ParamId::ALL {
            check(param, self.get(param))?;
        }
        Ok(())
    }

    /// Field-wise comparison within `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        ParamId::ALL
            .into_iter()
            .filter(|p| !p.is_derived())
            .all(|p| (self.stored(p) - other.stored(p)).abs() <= tol)
    }

    /// Constraint propagation after a write to `changed`.
    fn propagate(&mut self, changed: ParamId, value: f64, ratio_before: f64) {
        match changed {
            ParamId::RodRatio => self.linkage_length = value * self.elevator_length,
            ParamId::ElevatorLength => self.linkage_length = ratio_before * self.elevator_length,
            _ => {}
        }
    }

    fn stored(&self, param: ParamId) -> f64 {
        match param {
            ParamId::ElevatorLength => self.elevator_length,
            ParamId::ForearmLength => self.forearm_length,
            ParamId::LinkageLength => self.linkage_length,
            ParamId::LowerActuatorLength => self.lower_actuator_length,
            ParamId::UpperActuatorLength => self.upper_actuator_length,
            ParamId::WristLength => self.wrist_length,
            ParamId::ElevatorWeight => self.elevator_weight,
            ParamId::ForearmWeight => self.forearm_weight,
            ParamId::ElevatorTorque => self.elevator_torque,
            ParamId::ActuatorTorque => self.actuator_torque,
            ParamId::MinLoad => self.min_load,
            ParamId::RodRatio => self.rod_ratio(),
        }
    }

    fn field_mut(&mut self, param: ParamId) -> Option<&mut f64> {
        match param {
            ParamId::ElevatorLength => Some(&mut self.elevator_length),
            ParamId::ForearmLength => Some(&mut self.forearm_length),
            ParamId::LinkageLength => Some(&mut self.linkage_length),
            ParamId::LowerActuatorLength => Some(&mut self.lower_actuator_length),
            ParamId::UpperActuatorLength => Some(&mut self.upper_actuator_length),
            ParamId::WristLength => Some(&mut self.wrist_length),
            ParamId::ElevatorWeight => Some(&mut self.elevator_weight),
            ParamId::ForearmWeight => Some(&mut self.forearm_weight),
            ParamId::ElevatorTorque => Some(&mut self.elevator_torque),
            ParamId::ActuatorTorque => Some(&mut self.actuator_torque),
            ParamId::MinLoad => Some(&mut self.min_load),
            ParamId::RodRatio => None,
        }
    }
}

fn check(param: ParamId, value: f64) -> Result<(), ParamError> {
    if !value.is_finite() {
        return Err(ParamError::NotFinite { param, value });
    }
    let meta = param.meta();
    if !meta.contains(value) {
        return Err(ParamError::OutOfRange {
            param,
            value,
            min: meta.min,
            max: meta.max,
        });
    }
    Ok(())
}
