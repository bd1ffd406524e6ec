//! Property and scenario tests for the solver's public surface.

use approx::assert_relative_eq;
use proptest::prelude::*;

use reach_common::{ArmConfig, ParamId};
use reach_solver::{DVec2, FieldGrid, SolveMode, SolveResult, solve};

fn arm_strategy() -> impl Strategy<Value = ArmConfig> {
    (100.0..250.0f64, 100.0..250.0f64, 0.8..1.3f64, 40.0..90.0f64, 30.0..80.0f64).prop_map(
        |(elevator, forearm, ratio, lower, upper)| {
            let mut arm = ArmConfig::default();
            arm.elevator_length = elevator;
            arm.forearm_length = forearm;
            arm.linkage_length = ratio * elevator;
            arm.lower_actuator_length = lower;
            arm.upper_actuator_length = upper;
            arm
        },
    )
}

fn field(arm: &ArmConfig, resolution: u32) -> reach_solver::FieldResult {
    solve(arm, &SolveMode::Field { resolution })
        .into_field()
        .expect("field mode returns a field")
}

// ─── Properties ─────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn solve_is_idempotent(arm in arm_strategy(), resolution in 4u32..24) {
        let mode = SolveMode::Field { resolution };
        prop_assert_eq!(solve(&arm, &mode), solve(&arm, &mode));
    }

    #[test]
    fn field_arrays_share_grid_dimensions(arm in arm_strategy(), resolution in 1u32..24) {
        let f = field(&arm, resolution);
        let n = f.width() * f.height();
        prop_assert_eq!(f.height(), 2 * f.width());
        prop_assert_eq!(f.reachable.len(), n);
        prop_assert_eq!(f.loads.len(), n);
        prop_assert_eq!(f.elbows.len(), n);
    }

    #[test]
    fn point_agrees_with_field_cell(
        arm in arm_strategy(),
        i in 0usize..16,
        j in 0usize..32,
    ) {
        let f = field(&arm, 16);
        let goal = f.grid.position(i, j);
        let SolveResult::Point(p) = solve(&arm, &SolveMode::Point(goal)) else {
            unreachable!("point mode returns a point");
        };
        let k = f.grid.index(i, j);
        prop_assert_eq!(p.valid, f.reachable[k]);
        match (p.elbow, f.elbows[k]) {
            (Some(a), Some(b)) => prop_assert!(a.distance(b) < 1e-9),
            (None, None) => {}
            (a, b) => prop_assert!(false, "elbow mismatch {:?} vs {:?}", a, b),
        }
        if p.valid {
            let load = p.load.unwrap_or_default();
            prop_assert!((load - f.loads[k]).abs() < 1e-9);
        }
    }

    #[test]
    fn rod_ratio_survives_elevator_edits(elevator in 20.0..800.0f64, ratio in 0.33..3.0f64) {
        let mut arm = ArmConfig::default();
        arm.set(ParamId::RodRatio, ratio).unwrap();
        arm.set(ParamId::ElevatorLength, elevator).unwrap();
        prop_assert!((arm.rod_ratio() - ratio).abs() < 1e-9);
    }
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[test]
fn reach_limit_boundary() {
    let arm = ArmConfig::default();
    assert_relative_eq!(arm.max_reach(), 308.4, epsilon = 1e-12);
    let at = solve(&arm, &SolveMode::Point(DVec2::new(308.4, 0.0)));
    let inside = solve(&arm, &SolveMode::Point(DVec2::new(308.3, 0.0)));
    assert!(at.as_point().unwrap().elbow.is_none());
    assert!(inside.as_point().unwrap().elbow.is_some());
}

#[test]
fn origin_is_invalid_without_errors() {
    let r = solve(&ArmConfig::default(), &SolveMode::Point(DVec2::ZERO));
    let p = r.as_point().unwrap();
    assert!(!p.valid);
    assert!(p.constraints.is_empty());
}

#[test]
fn default_configuration_field() {
    let f = field(&ArmConfig::default(), 200);
    assert_eq!(f.width(), 200);
    assert_eq!(f.height(), 400);
    assert!(f.reachable_count() > 0);
    assert!(f.contours.iter().any(|c| !c.is_empty()));
    // Every contour vertex lies within the grid's physical extent.
    let reach = ArmConfig::default().max_reach();
    for c in &f.contours {
        for p in &c.points {
            assert!(p.x >= -f.scaling_factor() && p.x <= reach);
            assert!(p.y.abs() <= reach + f.scaling_factor());
        }
    }
}

#[test]
fn sample_load_matches_cell_load() {
    let f = field(&ArmConfig::default(), 100);
    let grid: FieldGrid = f.grid;
    let (i, j) = (0..grid.height)
        .flat_map(|j| (0..grid.width).map(move |i| (i, j)))
        .find(|&(i, j)| f.reachable[grid.index(i, j)])
        .expect("default arm has valid cells");
    let sampled = f.sample_load(grid.position(i, j)).unwrap();
    assert_relative_eq!(sampled, f.loads[grid.index(i, j)]);
    assert_eq!(f.sample_load(DVec2::new(-50.0, 0.0)), None);
}

#[test]
fn shorter_torque_limits_shrink_the_region() {
    let strong = ArmConfig::default();
    let weak = strong.with(ParamId::ActuatorTorque, 2.0).unwrap();
    let a = field(&strong, 60).reachable_count();
    let b = field(&weak, 60).reachable_count();
    assert!(b <= a);
}
