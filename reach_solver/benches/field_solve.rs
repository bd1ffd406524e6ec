//! Field-mode solve throughput.
//!
//! - Single goal evaluation (the per-cell cost)
//! - Full field at ghost and focal resolutions
//! - Contour extraction alone on a solved mask

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use reach_common::{ArmConfig, ServoCalibration};
use reach_solver::contour;
use reach_solver::kinematics::evaluate;
use reach_solver::{DVec2, SolveMode, solve};

fn bench_single_goal(c: &mut Criterion) {
    let arm = ArmConfig::default();
    let cal = ServoCalibration::default();
    c.bench_function("evaluate_goal", |b| {
        b.iter(|| evaluate(&arm, &cal, black_box(DVec2::new(200.0, 50.0))));
    });
}

fn bench_field(c: &mut Criterion) {
    let arm = ArmConfig::default();
    let mut group = c.benchmark_group("field_solve");
    for resolution in [60u32, 120, 200] {
        group.bench_function(format!("res_{resolution}"), |b| {
            b.iter(|| solve(&arm, black_box(&SolveMode::Field { resolution })));
        });
    }
    group.finish();
}

fn bench_contour(c: &mut Criterion) {
    let arm = ArmConfig::default();
    let field = solve(&arm, &SolveMode::Field { resolution: 200 })
        .into_field()
        .unwrap();
    let grid = field.grid;
    c.bench_function("contour_extract_200", |b| {
        b.iter(|| contour::extract(black_box(&field.reachable), grid.width, grid.height, grid.step));
    });
}

criterion_group!(benches, bench_single_goal, bench_field, bench_contour);
criterion_main!(benches);
