//! Sweep scheduler scenarios against a real pool and solver.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reach_common::config::AppConfig;
use reach_common::{ArmConfig, ParamId};
use reach_solver::Contour;
use reach_sweep::display::{GhostColor, GhostDisplay};
use reach_sweep::pool::PoolError;
use reach_sweep::scheduler::{SchedulerError, SweepScheduler};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Update(usize),
    Color(usize),
    Hide(usize),
    Show(usize),
}

struct RecordingDisplay {
    id: usize,
    log: Arc<Mutex<Vec<Event>>>,
}

impl GhostDisplay for RecordingDisplay {
    fn update(&mut self, _contours: &[Contour]) {
        self.log.lock().push(Event::Update(self.id));
    }
    fn set_color(&mut self, _color: GhostColor) {
        self.log.lock().push(Event::Color(self.id));
    }
    fn hide(&mut self) {
        self.log.lock().push(Event::Hide(self.id));
    }
    fn show(&mut self) {
        self.log.lock().push(Event::Show(self.id));
    }
}

fn displays(n: usize, log: &Arc<Mutex<Vec<Event>>>) -> Vec<Box<dyn GhostDisplay>> {
    (0..n)
        .map(|id| {
            Box::new(RecordingDisplay {
                id,
                log: Arc::clone(log),
            }) as Box<dyn GhostDisplay>
        })
        .collect()
}

fn small_config(refresh_ticks: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.sweep.resolution = 24;
    config.sweep.ghost_resolution = 12;
    config.sweep.refresh_ticks = refresh_ticks;
    config.sweep.parameters = vec![ParamId::ElevatorLength, ParamId::ForearmLength];
    config.sweep.focus = ParamId::ElevatorLength;
    config.pool.workers = 2;
    config
}

fn targets(s: &SweepScheduler, param: ParamId) -> Vec<(f64, u64)> {
    s.ring(param)
        .unwrap()
        .slots()
        .iter()
        .map(|slot| (slot.target, slot.generation))
        .collect()
}

fn tick_until(s: &mut SweepScheduler, mut done: impl FnMut(&SweepScheduler) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !done(s) {
        assert!(Instant::now() < deadline, "scheduler did not settle");
        s.tick().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn focused_edit_recycles_exactly_the_trailing_slots() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(6, &log)).unwrap();

    let elevator_before = targets(&s, ParamId::ElevatorLength);
    let forearm_before = targets(&s, ParamId::ForearmLength);

    let mut arm = config.arm.clone();
    arm.set(ParamId::ElevatorLength, 148.4 * 1.08f64.powf(2.5)).unwrap();
    s.on_config_changed(&arm).unwrap();

    let elevator_after = targets(&s, ParamId::ElevatorLength);
    let changed = elevator_before
        .iter()
        .zip(&elevator_after)
        .filter(|(a, b)| a != b)
        .count();
    assert_eq!(changed, 3);
    assert_eq!(s.stats().recycled, 3);
    assert_eq!(targets(&s, ParamId::ForearmLength), forearm_before);
}

#[test]
fn results_latch_and_feed_the_callback() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(6, &log)).unwrap();
    let seen = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&seen);
    s.set_on_focal(move |field| {
        assert_eq!(field.width(), 24);
        *counter.lock() += 1;
    });

    tick_until(&mut s, |s| s.latest_field().is_some() && s.stats().ghost_completions >= 16);
    assert_eq!(*seen.lock(), 1);

    // Focused-ring ghosts reached their bound displays.
    assert!(log.lock().iter().any(|e| matches!(e, Event::Update(_))));

    let field = s.latest_field().unwrap();
    let grid = field.grid;
    let (i, j) = (0..grid.height)
        .flat_map(|j| (0..grid.width).map(move |i| (i, j)))
        .find(|&(i, j)| field.reachable[grid.index(i, j)])
        .expect("default arm has valid cells");
    let expected = field.loads[grid.index(i, j)];
    assert_eq!(s.sample_load(grid.position(i, j)), Some(expected));
}

#[test]
fn newest_configuration_wins() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(0, &log)).unwrap();

    let mut arm = config.arm.clone();
    for k in 1..=5 {
        arm.set(ParamId::ForearmLength, 160.0 + 4.0 * k as f64).unwrap();
        s.on_config_changed(&arm).unwrap();
        s.tick().unwrap();
    }
    let expected_step = arm.max_reach() / 24.0;
    let matches = |s: &SweepScheduler| {
        s.latest_field()
            .is_some_and(|f| (f.scaling_factor() - expected_step).abs() < 1e-12)
    };
    tick_until(&mut s, matches);
    for _ in 0..20 {
        s.tick().unwrap();
        thread::sleep(Duration::from_millis(1));
        assert!(matches(&s), "latched focal result reverted");
    }
}

#[test]
fn background_refresh_resubmits_stale_rings() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(1);
    let mut s = SweepScheduler::new(&config, displays(0, &log)).unwrap();

    let mut arm = config.arm.clone();
    arm.set(ParamId::ForearmLength, 170.0).unwrap();
    s.on_config_changed(&arm).unwrap();
    // Background ring windows wait for the timer.
    assert_eq!(s.stats().recycled, 0);

    s.tick().unwrap();
    let stats = s.stats();
    // ln(170 / 160) / ln(1.08) ≈ 0.79 steps: only the -4 slot leaves.
    assert_eq!(stats.recycled, 1);
    // Every elevator ghost was solved with the old forearm.
    assert_eq!(stats.refreshed, 8);
}

#[test]
fn focus_switch_detaches_before_attaching() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(6, &log)).unwrap();
    assert!(s.bindings().iter().all(Option::is_some));

    log.lock().clear();
    s.set_focus(ParamId::ForearmLength).unwrap();
    assert_eq!(s.focus(), ParamId::ForearmLength);

    let events = log.lock().clone();
    assert!(events.len() >= 12);
    assert!(events[..6].iter().all(|e| matches!(e, Event::Hide(_))));

    let ring = s.ring(ParamId::ForearmLength).unwrap();
    let mut bound: Vec<usize> = s.bindings().iter().flatten().copied().collect();
    bound.sort();
    bound.dedup();
    assert_eq!(bound.len(), 6);
    // The six nearest slots are ±1..±3 steps away.
    assert!(bound.iter().all(|&p| ring.slots()[p].index.abs() <= 3));
}

#[test]
fn invalid_requests_are_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    assert!(matches!(
        SweepScheduler::new(&config, displays(7, &log)),
        Err(SchedulerError::TooManyDisplays { given: 7, .. })
    ));

    let mut s = SweepScheduler::new(&config, displays(2, &log)).unwrap();
    assert!(matches!(
        s.set_focus(ParamId::MinLoad),
        Err(SchedulerError::UnknownParameter(ParamId::MinLoad))
    ));
}

#[test]
fn out_of_bounds_targets_stay_idle() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut config = small_config(10_000);
    // 790 * 1.08 exceeds the 800 mm bound.
    config.arm.set(ParamId::ElevatorLength, 790.0).unwrap();
    let s = SweepScheduler::new(&config, displays(6, &log)).unwrap();
    let ring = s.ring(ParamId::ElevatorLength).unwrap();
    let idle: Vec<bool> = ring.slots().iter().map(|slot| slot.idle).collect();
    assert_eq!(idle, vec![false, false, false, false, true, true, true, true]);
    // Idle slots never hold a display.
    for pos in s.bindings().iter().flatten() {
        assert!(!ring.slots()[*pos].idle);
    }
}

#[test]
fn shutdown_is_idempotent_and_final() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(0, &log)).unwrap();
    s.shutdown();
    s.shutdown();
    assert!(s.is_shut_down());
    assert!(matches!(
        s.tick(),
        Err(SchedulerError::Pool(PoolError::Terminated))
    ));
    let arm = ArmConfig::default().with(ParamId::ForearmLength, 170.0).unwrap();
    assert!(s.on_config_changed(&arm).is_err());
}

#[test]
fn starts_from_a_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[arm]
forearm_length = 170.0

[sweep]
resolution = 16
ghost_resolution = 8
parameters = ["rod_ratio"]
focus = "rod_ratio"
displays = 3

[pool]
workers = 1
"#
    )
    .unwrap();
    file.flush().unwrap();
    let config = AppConfig::load_validated(file.path()).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut s = SweepScheduler::new(&config, displays(config.sweep.displays, &log)).unwrap();
    assert_eq!(s.focus(), ParamId::RodRatio);
    assert!(s.ring(ParamId::ElevatorLength).is_none());
    assert_eq!(s.bindings().len(), 3);
    tick_until(&mut s, |s| s.latest_field().is_some());
    assert_eq!(s.latest_field().unwrap().width(), 16);
}

#[test]
fn focus_switch_catches_up_a_background_ring() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = small_config(10_000);
    let mut s = SweepScheduler::new(&config, displays(6, &log)).unwrap();

    let mut arm = config.arm.clone();
    arm.set(ParamId::ForearmLength, 400.0).unwrap();
    s.on_config_changed(&arm).unwrap();
    // The forearm ring still centres on 160 until something catches it up.
    assert_eq!(s.stats().recycled, 0);

    s.set_focus(ParamId::ForearmLength).unwrap();
    let ring = s.ring(ParamId::ForearmLength).unwrap();
    for pos in 0..ring.slots().len() {
        assert!(ring.distance(pos, 400.0) <= 4.0 + 1e-9, "slot {pos} outside window");
        assert!(!ring.is_stale(pos, s.arm()), "slot {pos} solved for an old config");
    }
    assert_eq!(s.stats().recycled, 8);
    for pos in s.bindings().iter().flatten() {
        assert!(ring.slots()[*pos].index.abs() <= 3);
    }
}

#[test]
fn replaced_focal_jobs_are_discarded_as_stale() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut config = small_config(10_000);
    // Enough workers that the focal job always dispatches on the first poll.
    config.pool.workers = 32;
    let mut s = SweepScheduler::new(&config, displays(0, &log)).unwrap();

    let mut arm = config.arm.clone();
    for k in 1..=5 {
        s.tick().unwrap();
        arm.set(ParamId::ForearmLength, 160.0 + 4.0 * k as f64).unwrap();
        s.on_config_changed(&arm).unwrap();
    }
    // Six focal submissions: each one is either latched or dropped.
    tick_until(&mut s, |s| {
        let stats = s.stats();
        stats.focal_completions + stats.stale_discards == 6
    });
    let stats = s.stats();
    assert!(stats.stale_discards >= 1);
    let expected_step = arm.max_reach() / 24.0;
    let field = s.latest_field().unwrap();
    assert!((field.scaling_factor() - expected_step).abs() < 1e-12);
}

#[test]
fn out_of_bounds_recycle_cancels_the_queued_solve() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut config = small_config(10_000);
    config.arm.set(ParamId::ElevatorLength, 600.0).unwrap();
    let mut s = SweepScheduler::new(&config, displays(6, &log)).unwrap();
    // 600 * 1.08^4 > 800: the top slot starts idle.
    assert_eq!(s.pool_stats().cancelled, 0);

    // One full step up: the -4 slot recycles to index 5 (881 mm), which is
    // out of bounds, while its first solve is still queued.
    let mut arm = config.arm.clone();
    arm.set(ParamId::ElevatorLength, 600.0 * 1.08).unwrap();
    s.on_config_changed(&arm).unwrap();

    assert_eq!(s.stats().recycled, 1);
    assert_eq!(s.pool_stats().cancelled, 1);
    let ring = s.ring(ParamId::ElevatorLength).unwrap();
    let recycled = ring.slots().iter().find(|slot| slot.index == 5).unwrap();
    assert!(recycled.idle);
    assert!(recycled.handle.is_none());
}
