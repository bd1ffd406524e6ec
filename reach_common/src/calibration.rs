//! Servo calibration data.
//!
//! Joint angles are mapped into the servo's actuation domain by a fixed
//! affine transform, `sign * (degrees - offset_deg)`. The offsets come from
//! the physical build and are treated as supplied data, so they load from
//! the `[calibration]` table rather than being compiled in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for a rejected calibration table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// Range bounds are not finite or not in increasing order.
    #[error("{name} [{min_deg}, {max_deg}] is not an ordered finite range")]
    InvalidRange {
        name: &'static str,
        min_deg: f64,
        max_deg: f64,
    },

    /// Servo map sign is not ±1 or its offset is not finite.
    #[error("{name} servo map needs sign ±1 and a finite offset (got {sign}, {offset_deg})")]
    InvalidServoMap {
        name: &'static str,
        sign: f64,
        offset_deg: f64,
    },

    /// Elbow minimum is NaN or infinite.
    #[error("elbow_min_deg {0} is not finite")]
    ElbowMinNotFinite(f64),
}

/// Open interval of accepted values, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min_deg: f64,
    pub max_deg: f64,
}

impl AngleRange {
    pub const fn new(min_deg: f64, max_deg: f64) -> Self {
        Self { min_deg, max_deg }
    }

    /// Strict containment. NaN is never contained.
    #[inline]
    pub fn contains(&self, deg: f64) -> bool {
        deg > self.min_deg && deg < self.max_deg
    }
}

/// Affine joint-angle to servo-setting map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoMap {
    pub sign: f64,
    pub offset_deg: f64,
}

impl ServoMap {
    /// Servo setting for a joint angle given in radians.
    #[inline]
    pub fn apply(&self, angle_rad: f64) -> f64 {
        self.sign * (angle_rad.to_degrees() - self.offset_deg)
    }
}

/// Calibration and mechanical limits used by validity classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoCalibration {
    /// Elevator angle (from vertical) to servo setting.
    pub elevator: ServoMap,
    /// Accepted elevator servo settings.
    pub elevator_range: AngleRange,
    /// Actuator angle (from vertical) to servo setting.
    pub actuator: ServoMap,
    /// Accepted actuator servo settings.
    pub actuator_range: AngleRange,
    /// Accepted forearm angle from vertical.
    pub forearm_range: AngleRange,
    /// Accepted angle between elevator and actuator line.
    pub base_range: AngleRange,
    /// Smallest accepted elbow angle.
    pub elbow_min_deg: f64,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            elevator: ServoMap {
                sign: -1.0,
                offset_deg: 178.21,
            },
            elevator_range: AngleRange::new(60.0, 210.0),
            actuator: ServoMap {
                sign: 1.0,
                offset_deg: -204.78,
            },
            actuator_range: AngleRange::new(100.0, 250.0),
            forearm_range: AngleRange::new(80.0, 200.0),
            base_range: AngleRange::new(44.0, 175.0),
            elbow_min_deg: 10.0,
        }
    }
}

impl ServoCalibration {
    /// Check that every range is ordered and every number finite.
    ///
    /// # Errors
    ///
    /// The first [`CalibrationError`] found, checking ranges before servo
    /// maps.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let ranges = [
            ("elevator_range", self.elevator_range),
            ("actuator_range", self.actuator_range),
            ("forearm_range", self.forearm_range),
            ("base_range", self.base_range),
        ];
        for (name, r) in ranges {
            if !r.min_deg.is_finite() || !r.max_deg.is_finite() || r.min_deg >= r.max_deg {
                return Err(CalibrationError::InvalidRange {
                    name,
                    min_deg: r.min_deg,
                    max_deg: r.max_deg,
                });
            }
        }
        for (name, m) in [("elevator", self.elevator), ("actuator", self.actuator)] {
            if !m.offset_deg.is_finite() || m.sign.abs() != 1.0 {
                return Err(CalibrationError::InvalidServoMap {
                    name,
                    sign: m.sign,
                    offset_deg: m.offset_deg,
                });
            }
        }
        if !self.elbow_min_deg.is_finite() {
            return Err(CalibrationError::ElbowMinNotFinite(self.elbow_min_deg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn elevator_map_matches_build_offsets() {
        let cal = ServoCalibration::default();
        // Straight up maps to 178.21.
        assert_relative_eq!(cal.elevator.apply(0.0), 178.21, epsilon = 1e-9);
        // Tilted 90° right maps to 88.21.
        assert_relative_eq!(
            cal.elevator.apply(std::f64::consts::FRAC_PI_2),
            88.21,
            epsilon = 1e-9
        );
    }

    #[test]
    fn actuator_map_adds_offset() {
        let cal = ServoCalibration::default();
        assert_relative_eq!(cal.actuator.apply(0.0), 204.78, epsilon = 1e-9);
    }

    #[test]
    fn range_is_open_and_rejects_nan() {
        let r = AngleRange::new(10.0, 20.0);
        assert!(!r.contains(10.0));
        assert!(r.contains(15.0));
        assert!(!r.contains(20.0));
        assert!(!r.contains(f64::NAN));
    }

    #[test]
    fn validate_catches_inverted_range() {
        let mut cal = ServoCalibration::default();
        assert!(cal.validate().is_ok());
        cal.base_range = AngleRange::new(175.0, 44.0);
        assert!(matches!(
            cal.validate(),
            Err(CalibrationError::InvalidRange { name: "base_range", .. })
        ));
    }

    #[test]
    fn validate_reports_typed_errors() {
        let mut cal = ServoCalibration::default();
        cal.actuator.sign = 0.5;
        assert!(matches!(
            cal.validate(),
            Err(CalibrationError::InvalidServoMap { name: "actuator", .. })
        ));

        let mut cal = ServoCalibration::default();
        cal.elbow_min_deg = f64::NAN;
        let err = cal.validate().unwrap_err();
        assert!(matches!(err, CalibrationError::ElbowMinNotFinite(_)));
        assert!(err.to_string().contains("elbow_min_deg"));
    }
}
