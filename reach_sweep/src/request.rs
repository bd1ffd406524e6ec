//! Versioned values crossing into and out of the worker threads.
//!
//! A request owns its own copy of the arm configuration, so no solve ever
//! observes a configuration that is edited while it runs. The generation
//! travels with the result and lets the scheduler drop anything a newer
//! submission has made stale.

use reach_common::{ArmConfig, ParamId};
use reach_solver::{FieldResult, SolveMode, SolveResult, Solver};

/// Identity of the slot a job solves for; doubles as the pool's
/// supersession key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// The current configuration at full resolution.
    Focal,
    /// Slot `slot` of the ring for `param`.
    Ghost { param: ParamId, slot: usize },
}

/// One solve, ready to run on a worker.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub source: SourceKey,
    pub generation: u64,
    pub arm: ArmConfig,
    pub mode: SolveMode,
}

impl SolveRequest {
    /// Field solve of an explicit snapshot of `arm`.
    pub fn field(source: SourceKey, generation: u64, arm: &ArmConfig, resolution: u32) -> Self {
        Self {
            source,
            generation,
            arm: arm.clone(),
            mode: SolveMode::Field { resolution },
        }
    }

    pub fn run(self, solver: &Solver) -> SolveOutput {
        let result = solver.solve(&self.arm, &self.mode);
        SolveOutput {
            source: self.source,
            generation: self.generation,
            result,
        }
    }
}

/// A finished solve, tagged with the request it answers.
#[derive(Debug, Clone)]
pub struct SolveOutput {
    pub source: SourceKey,
    pub generation: u64,
    pub result: SolveResult,
}

impl SolveOutput {
    /// The field result, if this was a field solve.
    pub fn field(&self) -> Option<&FieldResult> {
        self.result.as_field()
    }
}
