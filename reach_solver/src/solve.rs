//! Solver entry point.

use glam::DVec2;
use reach_common::{ArmConfig, ServoCalibration};
use serde::Serialize;
use tracing::trace;

use crate::field::{FieldResult, solve_field};
use crate::point::{PointResult, solve_point};

/// What to solve for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolveMode {
    /// One goal point.
    Point(DVec2),
    /// A grid with `resolution` columns.
    Field { resolution: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SolveResult {
    Point(PointResult),
    Field(FieldResult),
}

impl SolveResult {
    pub fn as_field(&self) -> Option<&FieldResult> {
        match self {
            SolveResult::Field(f) => Some(f),
            SolveResult::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<&PointResult> {
        match self {
            SolveResult::Point(p) => Some(p),
            SolveResult::Field(_) => None,
        }
    }

    pub fn into_field(self) -> Option<FieldResult> {
        match self {
            SolveResult::Field(f) => Some(f),
            SolveResult::Point(_) => None,
        }
    }
}

/// Stateless solver bound to one servo calibration.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    calibration: ServoCalibration,
}

impl Solver {
    pub fn new(calibration: ServoCalibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &ServoCalibration {
        &self.calibration
    }

    pub fn solve(&self, arm: &ArmConfig, mode: &SolveMode) -> SolveResult {
        match *mode {
            SolveMode::Point(goal) => {
                if !goal.is_finite() {
                    trace!(?goal, "non-finite goal");
                }
                SolveResult::Point(solve_point(arm, &self.calibration, goal))
            }
            SolveMode::Field { resolution } => {
                if resolution == 0 {
                    trace!("field resolution 0 clamped to 1");
                }
                SolveResult::Field(solve_field(arm, &self.calibration, resolution))
            }
        }
    }
}

/// Solve with the default calibration.
pub fn solve(arm: &ArmConfig, mode: &SolveMode) -> SolveResult {
    Solver::default().solve(arm, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selects_result_kind() {
        let arm = ArmConfig::default();
        assert!(solve(&arm, &SolveMode::Point(DVec2::new(200.0, 50.0))).as_point().is_some());
        assert!(solve(&arm, &SolveMode::Field { resolution: 10 }).as_field().is_some());
    }

    #[test]
    fn non_finite_goal_is_simply_invalid() {
        let arm = ArmConfig::default();
        let r = solve(&arm, &SolveMode::Point(DVec2::new(f64::NAN, 0.0)));
        assert!(!r.as_point().unwrap().valid);
    }
}
