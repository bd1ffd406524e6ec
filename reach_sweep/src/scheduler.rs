//! Sweep scheduler: the focal solve plus one ghost ring per parameter.
//!
//! Single-threaded and non-blocking. The caller reports configuration edits
//! through [`SweepScheduler::on_config_changed`] and drives
//! [`SweepScheduler::tick`] at a fixed interval; all solving happens on the
//! job pool's workers.
//!
//! # Priorities
//!
//! | Job                 | Priority                     |
//! |---------------------|------------------------------|
//! | Focal               | `0`                          |
//! | Focused ring slot   | `10 + steps from current`    |
//! | Background ring slot| `100 + steps from current`   |
//!
//! # Staleness
//!
//! Every submission gets a fresh generation. A finished job is accepted
//! only if its generation matches what its slot currently expects; anything
//! else is counted and dropped. Handles replaced by a resubmission are kept
//! as retired until they finish, so late results still pass the check.

use std::collections::BTreeMap;
use std::sync::Arc;

use reach_common::config::{AppConfig, SweepConfig};
use reach_common::consts::MAX_DISPLAYS;
use reach_common::{ArmConfig, ParamId};
use reach_solver::{DVec2, FieldResult, Solver};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::display::{GhostColor, GhostDisplay};
use crate::pool::{JobHandle, JobPool, PoolError, PoolStats, Priority};
use crate::request::{SolveOutput, SolveRequest, SourceKey};
use crate::ring::{ParamRing, SolverSlot};

const FOCAL_PRIORITY: Priority = 0;
const FOCUSED_RING_PRIORITY: Priority = 10;
const BACKGROUND_RING_PRIORITY: Priority = 100;

/// Error type for scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The parameter has no ghost ring.
    #[error("Parameter {0} is not swept")]
    UnknownParameter(ParamId),

    /// More display identities than can be latched.
    #[error("{given} display identities exceed the limit of {max}")]
    TooManyDisplays { given: usize, max: usize },
}

/// Counters for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub submissions: u64,
    /// Queued jobs replaced before dispatch.
    pub supersessions: u64,
    /// Finished jobs dropped for carrying an old generation.
    pub stale_discards: u64,
    /// Ring slots recycled to a new target by a window slide.
    pub recycled: u64,
    /// Slots resubmitted because another parameter changed.
    pub refreshed: u64,
    pub focal_completions: u64,
    pub ghost_completions: u64,
    pub failures: u64,
}

/// What one tick latched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A new focal result was latched.
    pub focal: bool,
    /// Ghost results latched.
    pub ghosts: usize,
    /// Finished jobs dropped without latching.
    pub stale: usize,
}

type FocalCallback = Box<dyn FnMut(&FieldResult)>;

#[derive(Debug, Default)]
struct FocalSlot {
    generation: u64,
    handle: Option<JobHandle<SolveOutput>>,
    latest: Option<Arc<SolveOutput>>,
}

/// Owns the job pool, the rings and the display bindings.
pub struct SweepScheduler {
    solver: Solver,
    sweep: SweepConfig,
    arm: ArmConfig,
    pool: JobPool<SourceKey, SolveOutput>,
    focal: FocalSlot,
    rings: BTreeMap<ParamId, ParamRing>,
    focus: ParamId,
    displays: Vec<Box<dyn GhostDisplay>>,
    /// Display index to slot position in the focused ring.
    bindings: Vec<Option<usize>>,
    /// Replaced handles whose jobs may still finish.
    retired: Vec<(SourceKey, JobHandle<SolveOutput>)>,
    on_focal: Option<FocalCallback>,
    next_generation: u64,
    stats: SchedulerStats,
}

impl SweepScheduler {
    /// Build rings for every swept parameter and submit the initial solves.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::TooManyDisplays`] for more than
    ///   [`MAX_DISPLAYS`] displays
    /// - [`SchedulerError::UnknownParameter`] if the focus is not swept
    /// - [`SchedulerError::Pool`] if the workers cannot start
    pub fn new(config: &AppConfig, displays: Vec<Box<dyn GhostDisplay>>) -> Result<Self, SchedulerError> {
        if displays.len() > MAX_DISPLAYS {
            return Err(SchedulerError::TooManyDisplays {
                given: displays.len(),
                max: MAX_DISPLAYS,
            });
        }
        let sweep = config.sweep.clone();
        if !sweep.parameters.contains(&sweep.focus) {
            return Err(SchedulerError::UnknownParameter(sweep.focus));
        }
        let pool = JobPool::new(config.pool.effective_workers())?;
        let rings = sweep
            .parameters
            .iter()
            .map(|&p| (p, ParamRing::new(p, config.arm.get(p), sweep.step_ratio)))
            .collect();
        let bindings = vec![None; displays.len()];

        let mut scheduler = Self {
            solver: Solver::new(config.calibration),
            focus: sweep.focus,
            sweep,
            arm: config.arm.clone(),
            pool,
            focal: FocalSlot::default(),
            rings,
            displays,
            bindings,
            retired: Vec::new(),
            on_focal: None,
            next_generation: 0,
            stats: SchedulerStats::default(),
        };

        scheduler.submit_focal()?;
        let params: Vec<ParamId> = scheduler.rings.keys().copied().collect();
        for param in params {
            for pos in 0..scheduler.ring_len(param) {
                scheduler.submit_slot(param, pos)?;
            }
        }
        scheduler.attach_displays();
        info!(
            rings = scheduler.rings.len(),
            displays = scheduler.displays.len(),
            workers = scheduler.pool.capacity(),
            focus = %scheduler.focus,
            "sweep scheduler started"
        );
        Ok(scheduler)
    }

    /// Called with every new focal field result.
    pub fn set_on_focal<F>(&mut self, callback: F)
    where
        F: FnMut(&FieldResult) + 'static,
    {
        self.on_focal = Some(Box::new(callback));
    }

    /// Configuration of the newest focal submission.
    pub fn arm(&self) -> &ArmConfig {
        &self.arm
    }

    /// Parameter whose ring owns the displays.
    pub fn focus(&self) -> ParamId {
        self.focus
    }

    /// Ghost ring for `param`, if it is swept.
    pub fn ring(&self, param: ParamId) -> Option<&ParamRing> {
        self.rings.get(&param)
    }

    /// Display index to bound slot position in the focused ring.
    pub fn bindings(&self) -> &[Option<usize>] {
        &self.bindings
    }

    /// Counters since start, with supersessions taken from the pool.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            supersessions: self.pool.stats().superseded,
            ..self.stats
        }
    }

    /// Raw job pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Most recent focal field.
    pub fn latest_field(&self) -> Option<&FieldResult> {
        self.focal.latest.as_deref().and_then(SolveOutput::field)
    }

    /// Load at `point` in the most recent focal field.
    pub fn sample_load(&self, point: DVec2) -> Option<f64> {
        self.latest_field()?.sample_load(point)
    }

    // ─── Inputs ─────────────────────────────────────────────────────

    /// React to an edited configuration.
    ///
    /// Resubmits the focal solve and slides the focused ring's window if
    /// its parameter moved. Background rings catch up on the refresh timer.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Pool`] once the scheduler is shut down.
    pub fn on_config_changed(&mut self, arm: &ArmConfig) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        if arm.approx_eq(&self.arm, 0.0) {
            return Ok(());
        }
        let focus_moved = self.arm.get(self.focus) != arm.get(self.focus);
        self.arm = arm.clone();
        self.submit_focal()?;

        if focus_moved {
            let recycled = self.rewindow(self.focus)?;
            if recycled > 0 {
                self.detach_displays();
                self.attach_displays();
            } else {
                self.recolor_displays();
            }
        }
        Ok(())
    }

    /// Move the display identities to `param`'s ring.
    ///
    /// The new ring first catches up with the current configuration: its
    /// window slides to the current value and slots solved against an
    /// older configuration are resubmitted at focused priority.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::UnknownParameter`] if `param` has no ring
    /// - [`SchedulerError::Pool`] once the scheduler is shut down
    pub fn set_focus(&mut self, param: ParamId) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        if !self.rings.contains_key(&param) {
            return Err(SchedulerError::UnknownParameter(param));
        }
        if param == self.focus {
            return Ok(());
        }
        let previous = self.focus;
        self.detach_displays();
        self.focus = param;
        self.catch_up(param)?;
        self.reprioritize_ring(previous);
        self.reprioritize_ring(param);
        self.attach_displays();
        debug!(from = %previous, to = %param, "focus changed");
        Ok(())
    }

    /// Poll the pool and latch finished results.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Pool`] once the scheduler is shut down.
    pub fn tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        self.pool.poll()?;
        self.stats.ticks += 1;
        let mut outcome = TickOutcome::default();

        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|(_, handle)| handle.ready());
        self.retired = pending;
        for (key, handle) in done {
            let expected = self.expected_generation(key);
            if self.accept(handle.get(), expected)?.is_none() {
                outcome.stale += 1;
            }
        }

        if let Some(result) = take_ready(&mut self.focal.handle) {
            match self.accept(result, self.focal.generation)? {
                Some(out) => {
                    self.stats.focal_completions += 1;
                    if let (Some(cb), Some(field)) = (self.on_focal.as_mut(), out.field()) {
                        cb(field);
                    }
                    self.focal.latest = Some(out);
                    outcome.focal = true;
                }
                None => outcome.stale += 1,
            }
        }

        let params: Vec<ParamId> = self.rings.keys().copied().collect();
        for param in params {
            for pos in 0..self.ring_len(param) {
                let Some((result, generation)) = self
                    .rings
                    .get_mut(&param)
                    .and_then(|r| r.slot_mut(pos))
                    .and_then(|s| take_ready(&mut s.handle).map(|r| (r, s.generation)))
                else {
                    continue;
                };
                match self.accept(result, generation)? {
                    Some(out) => {
                        if let Some(slot) = self.rings.get_mut(&param).and_then(|r| r.slot_mut(pos)) {
                            slot.latched = Some(out);
                        }
                        self.stats.ghost_completions += 1;
                        outcome.ghosts += 1;
                        if param == self.focus {
                            self.repaint_slot(pos);
                        }
                        trace!(%param, pos, "ghost latched");
                    }
                    None => outcome.stale += 1,
                }
            }
        }

        if self.stats.ticks % u64::from(self.sweep.refresh_ticks.max(1)) == 0 {
            self.refresh()?;
        }
        Ok(outcome)
    }

    /// Terminate the pool. Idempotent.
    pub fn shutdown(&mut self) {
        if self.pool.is_terminated() {
            return;
        }
        self.pool.terminate();
        self.retired.clear();
        info!(stats = ?self.stats(), "sweep scheduler shut down");
    }

    /// [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.pool.is_terminated()
    }

    // ─── Submission ─────────────────────────────────────────────────

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.pool.is_terminated() {
            Err(SchedulerError::Pool(PoolError::Terminated))
        } else {
            Ok(())
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn expected_generation(&self, key: SourceKey) -> u64 {
        match key {
            SourceKey::Focal => self.focal.generation,
            SourceKey::Ghost { param, slot } => self
                .rings
                .get(&param)
                .and_then(|r| r.slot(slot))
                .map_or(0, |s| s.generation),
        }
    }

    /// Keep a replaced handle until its job finishes.
    fn retire(&mut self, key: SourceKey, handle: Option<JobHandle<SolveOutput>>) {
        if let Some(handle) = handle {
            self.retired.push((key, handle));
        }
    }

    fn submit_focal(&mut self) -> Result<(), SchedulerError> {
        let generation = self.next_generation();
        let request = SolveRequest::field(SourceKey::Focal, generation, &self.arm, self.sweep.resolution);
        let solver = self.solver.clone();
        let handle = self
            .pool
            .submit(move || request.run(&solver), Some(SourceKey::Focal), FOCAL_PRIORITY)?;
        self.focal.generation = generation;
        let previous = self.focal.handle.replace(handle);
        self.retire(SourceKey::Focal, previous);
        self.stats.submissions += 1;
        Ok(())
    }

    fn ring_len(&self, param: ParamId) -> usize {
        self.rings.get(&param).map_or(0, |r| r.slots().len())
    }

    fn slot_priority(&self, param: ParamId, pos: usize) -> Priority {
        let base = if param == self.focus {
            FOCUSED_RING_PRIORITY
        } else {
            BACKGROUND_RING_PRIORITY
        };
        let steps = self
            .rings
            .get(&param)
            .map_or(0.0, |r| r.distance(pos, self.arm.get(param)));
        base + steps.round().min(50.0) as Priority
    }

    /// Submit a solve for ring slot `pos`, superseding its queued job.
    /// Targets outside the parameter's bounds leave the slot idle and
    /// cancel its queued job.
    fn submit_slot(&mut self, param: ParamId, pos: usize) -> Result<(), SchedulerError> {
        let priority = self.slot_priority(param, pos);
        let generation = self.next_generation();
        let key = SourceKey::Ghost { param, slot: pos };
        let Some(slot) = self.rings.get_mut(&param).and_then(|r| r.slot_mut(pos)) else {
            return Ok(());
        };
        let snapshot = match self.arm.with(param, slot.target) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                trace!(%param, pos, error = %e, "ghost target out of bounds");
                slot.idle = true;
                slot.generation = generation;
                slot.basis = None;
                slot.latched = None;
                let previous = slot.handle.take();
                self.pool.cancel(&key);
                self.retire(key, previous);
                return Ok(());
            }
        };
        let request = SolveRequest::field(key, generation, &snapshot, self.sweep.ghost_resolution);
        let solver = self.solver.clone();
        let handle = self.pool.submit(move || request.run(&solver), Some(key), priority)?;
        slot.idle = false;
        slot.generation = generation;
        slot.basis = Some(snapshot);
        let previous = slot.handle.replace(handle);
        self.stats.submissions += 1;
        self.retire(key, previous);
        Ok(())
    }

    /// Slide `param`'s window and resubmit recycled slots.
    fn rewindow(&mut self, param: ParamId) -> Result<usize, SchedulerError> {
        let current = self.arm.get(param);
        let Some(ring) = self.rings.get_mut(&param) else {
            return Ok(0);
        };
        let recycled = ring.rewindow(current);
        for &pos in &recycled {
            self.submit_slot(param, pos)?;
        }
        if !recycled.is_empty() {
            self.stats.recycled += recycled.len() as u64;
            debug!(%param, count = recycled.len(), current, "ghost slots recycled");
        }
        Ok(recycled.len())
    }

    /// Slide `param`'s window and resubmit slots solved against an
    /// outdated configuration. Returns whether any slot was recycled.
    fn catch_up(&mut self, param: ParamId) -> Result<bool, SchedulerError> {
        let recycled = self.rewindow(param)?;
        let stale: Vec<usize> = match self.rings.get(&param) {
            Some(ring) => (0..ring.slots().len())
                .filter(|&pos| ring.is_stale(pos, &self.arm))
                .collect(),
            None => return Ok(recycled > 0),
        };
        for &pos in &stale {
            self.submit_slot(param, pos)?;
        }
        if !stale.is_empty() {
            self.stats.refreshed += stale.len() as u64;
            debug!(%param, count = stale.len(), "stale ghost slots resubmitted");
        }
        Ok(recycled > 0)
    }

    /// Timer work: bring every ring up to date.
    fn refresh(&mut self) -> Result<(), SchedulerError> {
        let params: Vec<ParamId> = self.rings.keys().copied().collect();
        let mut rebind = false;
        for param in params {
            let recycled = self.catch_up(param)?;
            rebind |= param == self.focus && recycled;
        }
        if rebind {
            self.detach_displays();
            self.attach_displays();
        }
        Ok(())
    }

    fn reprioritize_ring(&mut self, param: ParamId) {
        for pos in 0..self.ring_len(param) {
            let priority = self.slot_priority(param, pos);
            self.pool
                .reprioritize(&SourceKey::Ghost { param, slot: pos }, priority);
        }
    }

    /// Check generation, count failures. `Ok(None)` means drop it.
    fn accept(
        &mut self,
        result: Result<Arc<SolveOutput>, PoolError>,
        expected: u64,
    ) -> Result<Option<Arc<SolveOutput>>, SchedulerError> {
        match result {
            Ok(out) if out.generation == expected => Ok(Some(out)),
            Ok(out) => {
                self.stats.stale_discards += 1;
                trace!(source = ?out.source, got = out.generation, expected, "stale result dropped");
                Ok(None)
            }
            Err(PoolError::Superseded) => Ok(None),
            Err(PoolError::Terminated) => Err(SchedulerError::Pool(PoolError::Terminated)),
            Err(e) => {
                self.stats.failures += 1;
                warn!(error = %e, "solve failed");
                Ok(None)
            }
        }
    }

    // ─── Display latching ───────────────────────────────────────────

    fn detach_displays(&mut self) {
        for (display, binding) in self.displays.iter_mut().zip(self.bindings.iter_mut()) {
            if binding.take().is_some() {
                display.hide();
            }
        }
    }

    /// Bind displays to the focused ring's slots nearest the current value.
    fn attach_displays(&mut self) {
        let Some(ring) = self.rings.get(&self.focus) else {
            return;
        };
        let current = self.arm.get(self.focus);
        let order = ring.nearest(current);
        for (d, display) in self.displays.iter_mut().enumerate() {
            let pos = order
                .get(d)
                .copied()
                .filter(|&p| ring.slot(p).is_some_and(|s| !s.idle));
            self.bindings[d] = pos;
            match pos.and_then(|p| ring.slot(p)) {
                Some(slot) => paint(display.as_mut(), slot, current, ring.ratio()),
                None => display.hide(),
            }
        }
    }

    fn recolor_displays(&mut self) {
        let Some(ring) = self.rings.get(&self.focus) else {
            return;
        };
        let current = self.arm.get(self.focus);
        for (display, binding) in self.displays.iter_mut().zip(&self.bindings) {
            if let Some(slot) = binding.and_then(|p| ring.slot(p)) {
                if slot.latched.is_some() {
                    display.set_color(GhostColor::for_target(slot.target, current, ring.ratio()));
                }
            }
        }
    }

    /// Push slot `pos`'s geometry into its bound display, if any.
    fn repaint_slot(&mut self, pos: usize) {
        let Some(ring) = self.rings.get(&self.focus) else {
            return;
        };
        let Some(d) = self.bindings.iter().position(|b| *b == Some(pos)) else {
            return;
        };
        if let (Some(slot), Some(display)) = (ring.slot(pos), self.displays.get_mut(d)) {
            paint(display.as_mut(), slot, self.arm.get(self.focus), ring.ratio());
        }
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn take_ready(handle: &mut Option<JobHandle<SolveOutput>>) -> Option<Result<Arc<SolveOutput>, PoolError>> {
    if handle.as_ref().is_some_and(JobHandle::ready) {
        handle.take().map(|h| h.get())
    } else {
        None
    }
}

fn paint(display: &mut dyn GhostDisplay, slot: &SolverSlot, current: f64, ratio: f64) {
    match slot.latched.as_deref().and_then(SolveOutput::field) {
        Some(field) => {
            display.update(&field.contours);
            display.set_color(GhostColor::for_target(slot.target, current, ratio));
            display.show();
        }
        None => display.hide(),
    }
}
