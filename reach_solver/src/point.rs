//! Single-goal solve with the full position and force breakdown.

use glam::DVec2;
use reach_common::{ArmConfig, ServoCalibration};
use serde::Serialize;

use crate::constraints::Constraints;
use crate::kinematics::{JointAngles, evaluate};

/// Forces on the forearm at full load capacity, in newtons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceVectors {
    /// Linkage reaction at the upper actuator tip.
    pub p: DVec2,
    /// Elevator reaction at the elbow.
    pub f: DVec2,
    /// External load at the goal.
    pub l: DVec2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointResult {
    pub valid: bool,
    pub constraints: Constraints,
    pub goal: DVec2,
    pub elbow: Option<DVec2>,
    /// Tool tip, offset horizontally from the goal.
    pub wrist_tip: DVec2,
    pub angles: Option<JointAngles>,
    pub lower_actuator: Option<DVec2>,
    pub upper_actuator: Option<DVec2>,
    pub forces: Option<ForceVectors>,
    pub load: Option<f64>,
}

pub fn solve_point(arm: &ArmConfig, calibration: &ServoCalibration, goal: DVec2) -> PointResult {
    let eval = evaluate(arm, calibration, goal);
    let valid = eval.is_valid();
    let wrist_tip = goal + DVec2::new(arm.wrist_length, 0.0);

    let mut result = PointResult {
        valid,
        constraints: eval.constraints,
        goal,
        elbow: eval.elbow,
        wrist_tip,
        angles: eval.angles,
        lower_actuator: None,
        upper_actuator: None,
        forces: None,
        load: None,
    };

    if let (true, Some(s)) = (valid, eval.statics) {
        let load = s.capacity();
        let l = DVec2::new(0.0, -load);
        let p = s.linkage_per_newton * load + s.linkage_from_weight;
        let f = -(p + l + s.forearm_weight);
        result.lower_actuator = Some(s.lower_anchor);
        result.upper_actuator = Some(s.upper_anchor);
        result.forces = Some(ForceVectors { p, f, l });
        result.load = Some(load);
    }
    result
}
