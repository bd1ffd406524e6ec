//! Per-parameter ghost rings and their sliding window.
//!
//! A ring holds [`RING_SIZE`] slots on a geometric lattice
//! `base * ratio^k` around the parameter's value. Slots start at
//! `k = -4..=-1` and `k = 1..=4`; `k = 0` is the focal solve. As the value
//! moves, slots that fall more than [`HALF_WINDOW`] steps behind are
//! recycled one step past the opposite extreme.

use std::sync::Arc;

use heapless::Vec as FixedVec;
use reach_common::consts::{HALF_WINDOW, RING_SIZE};
use reach_common::{ArmConfig, ParamId};

use crate::pool::JobHandle;
use crate::request::SolveOutput;

/// Slack on window bounds, in lattice steps.
const WINDOW_TOL: f64 = 1e-9;

/// One ghost value and the state of its solve.
#[derive(Debug, Clone, Default)]
pub struct SolverSlot {
    /// Lattice index relative to the ring base.
    pub index: i32,
    /// Parameter value this slot solves for.
    pub target: f64,
    /// Generation of the newest submission; results must match it.
    pub generation: u64,
    /// In-flight job, if any.
    pub handle: Option<JobHandle<SolveOutput>>,
    /// Configuration the newest submission solved against.
    pub basis: Option<ArmConfig>,
    /// Latest accepted result.
    pub latched: Option<Arc<SolveOutput>>,
    /// Target lies outside the parameter bounds; nothing is solved.
    pub idle: bool,
}

impl SolverSlot {
    fn at(index: i32, target: f64) -> Self {
        Self {
            index,
            target,
            ..Self::default()
        }
    }

    /// Forget the previous target's solve. The handle stays until the
    /// next submission replaces it.
    fn retarget(&mut self, index: i32, target: f64) {
        self.index = index;
        self.target = target;
        self.basis = None;
        self.latched = None;
        self.idle = false;
    }
}

/// Ring of ghost slots for one parameter.
#[derive(Debug)]
pub struct ParamRing {
    param: ParamId,
    ratio: f64,
    base: f64,
    slots: FixedVec<SolverSlot, RING_SIZE>,
}

/// Slot positions (into the ring) touched by one window update.
pub type Recycled = FixedVec<usize, RING_SIZE>;

impl ParamRing {
    /// Ring centred on `current`.
    pub fn new(param: ParamId, current: f64, ratio: f64) -> Self {
        let mut ring = Self {
            param,
            ratio,
            base: current,
            slots: FixedVec::new(),
        };
        for index in seed_indices() {
            let target = ring.target_of(index);
            // Capacity equals the seed count.
            let _ = ring.slots.push(SolverSlot::at(index, target));
        }
        ring
    }

    /// Parameter this ring sweeps.
    pub fn param(&self) -> ParamId {
        self.param
    }

    /// Multiplicative step between neighbouring lattice positions.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Slots in fixed position order; positions never move, indices do.
    pub fn slots(&self) -> &[SolverSlot] {
        &self.slots
    }

    /// Slot at position `pos`.
    pub fn slot(&self, pos: usize) -> Option<&SolverSlot> {
        self.slots.get(pos)
    }

    /// Mutable slot at position `pos`.
    pub fn slot_mut(&mut self, pos: usize) -> Option<&mut SolverSlot> {
        self.slots.get_mut(pos)
    }

    fn target_of(&self, index: i32) -> f64 {
        self.base * self.ratio.powi(index)
    }

    /// Lattice coordinate of `value` (fractional).
    pub fn steps_of(&self, value: f64) -> f64 {
        (value / self.base).ln() / self.ratio.ln()
    }

    /// Distance of slot `pos` from `current`, in steps.
    pub fn distance(&self, pos: usize, current: f64) -> f64 {
        self.slots
            .get(pos)
            .map(|s| (s.index as f64 - self.steps_of(current)).abs())
            .unwrap_or(f64::INFINITY)
    }

    /// Slide the window to `current` and return the recycled slots.
    ///
    /// Each slot more than [`HALF_WINDOW`] steps below `current` moves one
    /// step above the current maximum (and vice versa). If that lands
    /// outside the window, the slot fills the highest (lowest) free lattice
    /// position inside it instead. When every slot is out of window the
    /// ring is reseeded around `current`.
    pub fn rewindow(&mut self, current: f64) -> Recycled {
        let mut recycled = Recycled::new();
        if !(current > 0.0) || !current.is_finite() {
            return recycled;
        }
        let x = self.steps_of(current);
        let lo = x - HALF_WINDOW as f64 - WINDOW_TOL;
        let hi = x + HALF_WINDOW as f64 + WINDOW_TOL;

        let mut low: FixedVec<usize, RING_SIZE> = FixedVec::new();
        let mut high: FixedVec<usize, RING_SIZE> = FixedVec::new();
        for (pos, slot) in self.slots.iter().enumerate() {
            let k = slot.index as f64;
            if k < lo {
                let _ = low.push(pos);
            } else if k > hi {
                let _ = high.push(pos);
            }
        }

        if low.len() + high.len() == self.slots.len() {
            self.base = current;
            for (pos, index) in seed_indices().into_iter().enumerate() {
                let target = self.target_of(index);
                if let Some(slot) = self.slots.get_mut(pos) {
                    slot.retarget(index, target);
                }
                let _ = recycled.push(pos);
            }
            return recycled;
        }

        low.sort_unstable_by_key(|&p| self.slots[p].index);
        high.sort_unstable_by_key(|&p| std::cmp::Reverse(self.slots[p].index));

        for &pos in &low {
            let beyond = self.max_index() + 1;
            let index = if beyond as f64 <= hi {
                beyond
            } else {
                self.free_index(lo, hi, true).unwrap_or(beyond)
            };
            let target = self.target_of(index);
            self.slots[pos].retarget(index, target);
            let _ = recycled.push(pos);
        }
        for &pos in &high {
            let beyond = self.min_index() - 1;
            let index = if beyond as f64 >= lo {
                beyond
            } else {
                self.free_index(lo, hi, false).unwrap_or(beyond)
            };
            let target = self.target_of(index);
            self.slots[pos].retarget(index, target);
            let _ = recycled.push(pos);
        }
        recycled
    }

    fn max_index(&self) -> i32 {
        self.slots.iter().map(|s| s.index).max().unwrap_or(0)
    }

    fn min_index(&self) -> i32 {
        self.slots.iter().map(|s| s.index).min().unwrap_or(0)
    }

    /// Unoccupied lattice index inside `[lo, hi]`, highest or lowest first.
    fn free_index(&self, lo: f64, hi: f64, highest: bool) -> Option<i32> {
        let (first, last) = (lo.ceil() as i32, hi.floor() as i32);
        let free = |k: &i32| !self.slots.iter().any(|s| s.index == *k);
        if highest {
            (first..=last).rev().find(free)
        } else {
            (first..=last).find(free)
        }
    }

    /// Slot positions ordered by distance from `current`, idle slots last.
    pub fn nearest(&self, current: f64) -> FixedVec<usize, RING_SIZE> {
        let x = self.steps_of(current);
        let mut order: FixedVec<usize, RING_SIZE> = (0..self.slots.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            let (sa, sb) = (&self.slots[a], &self.slots[b]);
            let da = (sa.index as f64 - x).abs();
            let db = (sb.index as f64 - x).abs();
            sa.idle
                .cmp(&sb.idle)
                .then(da.total_cmp(&db))
                .then(sa.index.cmp(&sb.index))
        });
        order
    }

    /// Whether slot `pos` was solved against a configuration other than
    /// `arm` with this ring's parameter set to the slot target.
    pub fn is_stale(&self, pos: usize, arm: &ArmConfig) -> bool {
        let Some(slot) = self.slots.get(pos) else {
            return false;
        };
        if slot.idle {
            return false;
        }
        let Some(basis) = &slot.basis else {
            return true;
        };
        match arm.with(self.param, slot.target) {
            Ok(expected) => !basis.approx_eq(&expected, 1e-9),
            Err(_) => true,
        }
    }
}

fn seed_indices() -> [i32; RING_SIZE] {
    let h = HALF_WINDOW as i32;
    let mut out = [0; RING_SIZE];
    for (n, k) in (-h..0).chain(1..=h).enumerate() {
        out[n] = k;
    }
    out
}
