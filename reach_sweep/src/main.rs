//! # Reach Sweep Binary
//!
//! Headless driver for the sweep scheduler: loads a configuration, runs a
//! scripted slider sweep over one parameter at the configured tick rate and
//! prints a JSON summary of the final focal field.
//!
//! # Usage
//!
//! ```bash
//! # Default arm, sweep the elevator from 140 to 170 mm in 10 steps
//! reach_sweep --param elevator_length --from 140 --to 170 --steps 10
//!
//! # Config file, verbose JSON logs
//! reach_sweep --config config/reach.toml -v --json
//!
//! # One-shot point solve
//! reach_sweep --point 200,50
//! ```

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use reach_common::config::AppConfig;
use reach_common::{ArmConfig, ParamId};
use reach_solver::{Contour, DVec2, SolveMode, Solver};
use reach_sweep::display::{GhostColor, GhostDisplay};
use reach_sweep::runner::{TickRunner, TickStats};
use reach_sweep::scheduler::{SchedulerStats, SweepScheduler};
use serde::Serialize;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

const HISTOGRAM_BINS: usize = 10;

/// Reach Sweep - ghost-ring sweep scheduler for the parallel-linkage arm
#[derive(Parser, Debug)]
#[command(name = "reach_sweep")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Sweeps an arm parameter and reports the reachable region")]
#[command(long_about = None)]
struct Args {
    /// Path to the TOML configuration (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parameter to focus and sweep (defaults to the configured focus)
    #[arg(short, long)]
    param: Option<ParamId>,

    /// Sweep start value
    #[arg(long, requires = "to")]
    from: Option<f64>,

    /// Sweep end value
    #[arg(long, requires = "from")]
    to: Option<f64>,

    /// Number of sweep steps
    #[arg(long, default_value_t = 10)]
    steps: u32,

    /// Ticks to run per sweep step (and after the last one)
    #[arg(long, default_value_t = 30)]
    ticks: u64,

    /// Solve a single goal point "x,y" and exit
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    point: Option<DVec2>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("reach_sweep failed: {}", e);
        eprintln!("reach_sweep failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_validated(path)?,
        None => AppConfig::default(),
    };
    setup_tracing(&args, config.shared.log_level.into());
    info!("Reach Sweep v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(goal) = args.point {
        let result = Solver::new(config.calibration).solve(&config.arm, &SolveMode::Point(goal));
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let param = args.param.unwrap_or(config.sweep.focus);
    let plan = sweep_plan(&config.arm, param, &args)?;

    let displays: Vec<Box<dyn GhostDisplay>> = (0..config.sweep.displays)
        .map(|id| Box::new(LogDisplay::new(id)) as Box<dyn GhostDisplay>)
        .collect();
    let mut scheduler = SweepScheduler::new(&config, displays)?;
    scheduler.set_focus(param)?;
    scheduler.set_on_focal(|field| {
        info!(
            reachable = field.reachable_count(),
            contours = field.contours.len(),
            max_load = field.max_load(),
            "focal field updated"
        );
    });

    let mut runner = TickRunner::new(Duration::from_millis(config.sweep.tick_ms));
    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let ticks_per_step = args.ticks.max(1);
    let total_ticks = (plan.len() as u64 + 1) * ticks_per_step;
    let mut arm = config.arm.clone();
    runner.run(Some(total_ticks), |tick| -> Result<_, Box<dyn std::error::Error>> {
        if tick % ticks_per_step == 0 {
            if let Some(&value) = plan.get((tick / ticks_per_step) as usize) {
                arm.set(param, value)?;
                debug!(%param, value, "slider moved");
                scheduler.on_config_changed(&arm)?;
            }
        }
        scheduler.tick()?;
        Ok(ControlFlow::Continue(()))
    })?;

    let summary = Summary::collect(&scheduler, param, runner.stats());
    scheduler.shutdown();
    if summary.reachable_cells.is_none() {
        warn!("no focal result latched; increase --ticks");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("Reach Sweep shutdown complete");
    Ok(())
}

/// Evenly spaced slider values from `--from` to `--to`, bounds-checked.
fn sweep_plan(arm: &ArmConfig, param: ParamId, args: &Args) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let (Some(from), Some(to)) = (args.from, args.to) else {
        return Ok(Vec::new());
    };
    let steps = args.steps.max(1);
    let plan: Vec<f64> = (0..=steps)
        .map(|k| from + (to - from) * f64::from(k) / f64::from(steps))
        .collect();
    for &value in &plan {
        arm.with(param, value)?;
    }
    Ok(plan)
}

fn parse_point(s: &str) -> Result<DVec2, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got {s:?}"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}"));
    Ok(DVec2::new(parse(x)?, parse(y)?))
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, configured: Level) {
    let level = if args.verbose { Level::DEBUG } else { configured };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

// ─── Output ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Summary {
    param: ParamId,
    value: f64,
    reachable_cells: Option<usize>,
    contours: usize,
    holes: usize,
    max_load: Option<f64>,
    load_histogram: Vec<usize>,
    scheduler: SchedulerStats,
    ticks: TickStats,
}

impl Summary {
    fn collect(scheduler: &SweepScheduler, param: ParamId, ticks: &TickStats) -> Self {
        let field = scheduler.latest_field();
        let contours = field.map_or(0, |f| f.contours.len());
        let holes = field.map_or(0, |f| f.contours.iter().filter(|c| c.is_hole).count());
        let max_load = field.map(|f| f.max_load());
        Self {
            param,
            value: scheduler.arm().get(param),
            reachable_cells: field.map(|f| f.reachable_count()),
            contours,
            holes,
            max_load,
            load_histogram: field
                .map(|f| f.load_histogram(HISTOGRAM_BINS, f.max_load()))
                .unwrap_or_default(),
            scheduler: scheduler.stats(),
            ticks: *ticks,
        }
    }
}

/// Display identity that only logs what it would draw.
struct LogDisplay {
    id: usize,
    visible: bool,
}

impl LogDisplay {
    fn new(id: usize) -> Self {
        Self { id, visible: false }
    }
}

impl GhostDisplay for LogDisplay {
    fn update(&mut self, contours: &[Contour]) {
        let vertices: usize = contours.iter().map(Contour::len).sum();
        debug!(display = self.id, contours = contours.len(), vertices, "ghost geometry");
    }

    fn set_color(&mut self, color: GhostColor) {
        trace!(display = self.id, tone = ?color.tone, intensity = color.intensity, "ghost colour");
    }

    fn hide(&mut self) {
        if self.visible {
            trace!(display = self.id, "ghost hidden");
        }
        self.visible = false;
    }

    fn show(&mut self) {
        if !self.visible {
            trace!(display = self.id, "ghost shown");
        }
        self.visible = true;
    }
}
