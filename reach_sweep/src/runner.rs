//! Fixed-interval tick loop.
//!
//! Sleeps to absolute deadlines (`start + n * interval`) so pacing does not
//! drift with body duration. A late tick is counted as an overrun and the
//! schedule skips ahead instead of bursting to catch up.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TickStats {
    pub tick_count: u64,
    /// Last body duration [ns].
    pub last_tick_ns: u64,
    pub max_tick_ns: u64,
    pub sum_tick_ns: u64,
    /// Ticks whose body outlasted the interval.
    pub overruns: u64,
}

impl TickStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick_ns: 0,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: u64) {
        self.tick_count += 1;
        self.last_tick_ns = duration_ns;
        self.max_tick_ns = self.max_tick_ns.max(duration_ns);
        self.sum_tick_ns = self.sum_tick_ns.saturating_add(duration_ns);
    }

    /// Average body duration [ns] (0 before the first tick).
    #[inline]
    pub fn avg_tick_ns(&self) -> u64 {
        if self.tick_count == 0 {
            0
        } else {
            self.sum_tick_ns / self.tick_count
        }
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Runner ─────────────────────────────────────────────────────────

pub struct TickRunner {
    interval: Duration,
    running: Arc<AtomicBool>,
    stats: TickStats,
}

impl TickRunner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(true)),
            stats: TickStats::new(),
        }
    }

    /// Shared flag; storing `false` stops the loop after the current tick.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `body` once per interval until it breaks, errors, the running
    /// flag clears, or `max_ticks` ticks have run.
    pub fn run<E, F>(&mut self, max_ticks: Option<u64>, mut body: F) -> Result<(), E>
    where
        F: FnMut(u64) -> Result<ControlFlow<()>, E>,
    {
        let start = Instant::now();
        let mut next_wake = start;
        let mut tick: u64 = 0;

        while self.running.load(Ordering::SeqCst) {
            if max_ticks.is_some_and(|max| tick >= max) {
                break;
            }
            let tick_start = Instant::now();
            let flow = body(tick)?;
            let elapsed = tick_start.elapsed();
            self.stats.record(elapsed.as_nanos().min(u64::MAX as u128) as u64);
            tick += 1;
            if flow.is_break() {
                debug!(tick, "tick body requested stop");
                break;
            }

            next_wake += self.interval;
            let now = Instant::now();
            if now > next_wake {
                self.stats.overruns += 1;
                trace!(tick, late_us = (now - next_wake).as_micros() as u64, "tick overrun");
                next_wake = now;
            } else {
                std::thread::sleep(next_wake - now);
            }
        }
        debug!(
            ticks = self.stats.tick_count,
            avg_ns = self.stats.avg_tick_ns(),
            overruns = self.stats.overruns,
            "tick loop stopped"
        );
        Ok(())
    }
}
