//! Per-goal inverse kinematics and validity classification.

use glam::DVec2;
use reach_common::{ArmConfig, ServoCalibration};
use serde::Serialize;

use crate::constraints::Constraints;
use crate::geometry::{EPS, elbow_position, safe_acos, signed_angle_from_vertical};
use crate::statics::{Statics, solve_statics};

/// Joint angles in radians.
///
/// Elevator, forearm and actuator angles are measured from vertical,
/// positive to the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointAngles {
    pub elevator: f64,
    pub forearm: f64,
    pub elbow: f64,
    pub base: f64,
    pub actuator: f64,
}

/// Everything known about one goal after evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub constraints: Constraints,
    /// Present when the goal is reachable.
    pub elbow: Option<DVec2>,
    /// Present when the goal is reachable and the quadrilateral closes.
    pub angles: Option<JointAngles>,
    /// Present when every geometric check passed.
    pub statics: Option<Statics>,
}

impl Evaluation {
    const UNREACHABLE: Self = Self {
        constraints: Constraints::empty(),
        elbow: None,
        angles: None,
        statics: None,
    };

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.constraints.is_valid()
    }

    /// Load capacity, only for valid goals.
    #[inline]
    pub fn load(&self) -> Option<f64> {
        if self.is_valid() {
            self.statics.map(|s| s.capacity())
        } else {
            None
        }
    }
}

/// Base angle and actuator angle for a given elevator and elbow angle.
///
/// The elevator, upper actuator, linkage and lower actuator form a
/// quadrilateral. The diagonal from the elevator pivot to the upper actuator
/// tip splits it into two triangles; the base angle is the sum of their
/// angles at the pivot. Cosines are clamped to [-1, 1]. `None` when the
/// diagonal collapses.
pub fn actuator_angle(arm: &ArmConfig, elevator_angle: f64, elbow_angle: f64) -> Option<(f64, f64)> {
    let a = arm.linkage_length;
    let b = arm.upper_actuator_length;
    let c = arm.elevator_length;
    let d = arm.lower_actuator_length;

    let y_sq = c * c + b * b - 2.0 * c * b * elbow_angle.cos();
    if !(y_sq > EPS) {
        return None;
    }
    let y = y_sq.sqrt();
    let toward_actuator = safe_acos((y_sq + d * d - a * a) / (2.0 * y * d));
    let toward_elevator = safe_acos((y_sq + c * c - b * b) / (2.0 * y * c));
    let base = toward_actuator + toward_elevator;
    Some((base, elevator_angle - base))
}

/// Evaluate a goal against the arm and its calibration.
pub fn evaluate(arm: &ArmConfig, calibration: &ServoCalibration, goal: DVec2) -> Evaluation {
    let Some(elbow) = elbow_position(goal, arm.elevator_length, arm.forearm_length) else {
        return Evaluation::UNREACHABLE;
    };
    let mut constraints = Constraints::REACHABLE;

    let elevator_dir = elbow / arm.elevator_length;
    let forearm_dir = (goal - elbow) / arm.forearm_length;

    let elevator = signed_angle_from_vertical(elevator_dir);
    let forearm = signed_angle_from_vertical(forearm_dir);
    let elbow_angle = safe_acos(elevator_dir.dot(forearm_dir));

    if calibration
        .elevator_range
        .contains(calibration.elevator.apply(elevator))
    {
        constraints |= Constraints::ELEVATOR_SERVO;
    }
    if calibration.forearm_range.contains(forearm.to_degrees()) {
        constraints |= Constraints::FOREARM_ANGLE;
    }
    if elbow_angle.to_degrees() > calibration.elbow_min_deg {
        constraints |= Constraints::ELBOW_ANGLE;
    }

    let Some((base, actuator)) = actuator_angle(arm, elevator, elbow_angle) else {
        return Evaluation {
            constraints,
            elbow: Some(elbow),
            angles: None,
            statics: None,
        };
    };
    if calibration
        .actuator_range
        .contains(calibration.actuator.apply(actuator))
    {
        constraints |= Constraints::ACTUATOR_SERVO;
    }
    if calibration.base_range.contains(base.to_degrees()) {
        constraints |= Constraints::BASE_ANGLE;
    }

    let angles = JointAngles {
        elevator,
        forearm,
        elbow: elbow_angle,
        base,
        actuator,
    };

    let statics = if constraints.geometry_ok() {
        solve_statics(arm, goal, elbow, forearm_dir, actuator)
    } else {
        None
    };
    if let Some(s) = statics {
        let capacity = s.capacity();
        if capacity.is_finite() && capacity > arm.min_load {
            constraints |= Constraints::LOAD;
        }
    }

    Evaluation {
        constraints,
        elbow: Some(elbow),
        angles: Some(angles),
        statics,
    }
}
