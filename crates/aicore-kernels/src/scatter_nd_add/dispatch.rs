//! Per-unit dispatch loop.
//!
//! Every unit runs the same state machine over the shared tiling blob:
//!
//! ```text
//! Init -> DecodeTiling -> FullChunks{0..n} -> RemainderChunk -> Done
//! ```
//!
//! Units the plan leaves idle go straight from `DecodeTiling` to `Done`.
//! Each chunk visit stages its buffers once and invokes the mode strategy
//! once.

use aicore_common::KernelError;
use serde::Serialize;

use super::engine::{ChunkDelta, IndexChunk, UnitCtx, accumulate_chunk};
use super::gate::RangeGate;
use super::tiling::TilingPlan;
use crate::element::ScatterElement;
use crate::staging::{DataMover, StagingArena, StagingBudget, TransferStats};
use crate::vector::{VectorStats, VectorUnit};

/// Dispatch state of one execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Init,
    DecodeTiling,
    FullChunks { next: usize },
    RemainderChunk,
    Done,
}

impl UnitState {
    /// First chunk state for `plan`, or `Done` when there are no indices.
    pub fn first_chunk(plan: &TilingPlan) -> Self {
        if plan.indices_loop_count > 0 {
            Self::FullChunks { next: 0 }
        } else {
            Self::after_full_chunks(plan)
        }
    }

    /// State after full chunk `done` has been processed.
    pub fn after_full_chunk(done: usize, plan: &TilingPlan) -> Self {
        if done + 1 < plan.indices_loop_count {
            Self::FullChunks { next: done + 1 }
        } else {
            Self::after_full_chunks(plan)
        }
    }

    fn after_full_chunks(plan: &TilingPlan) -> Self {
        if plan.indices_last_count > 0 { Self::RemainderChunk } else { Self::Done }
    }
}

/// What one unit did during a launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub unit: usize,
    /// Whether the plan assigned work to this unit.
    pub active: bool,
    pub chunks: u64,
    #[serde(flatten)]
    pub delta: ChunkDelta,
    pub vector: VectorStats,
    pub transfers: TransferStats,
    pub stages_released: u64,
}

/// Read-only inputs shared by every unit of a launch.
pub(crate) struct LaunchInputs<'a, T> {
    pub tiling: &'a [i64],
    pub indices: &'a [i32],
    pub adds: &'a [T],
    pub budget: &'a StagingBudget,
    pub check_partition: bool,
}

/// Staging and counters of a unit the plan assigned work to.
struct Worker<T> {
    plan: TilingPlan,
    arena: StagingArena<T>,
    mover: DataMover,
    vector: VectorUnit,
    chunk_elems: usize,
}

impl<T: ScatterElement> Worker<T> {
    fn new(plan: TilingPlan, budget: &StagingBudget) -> Self {
        Self {
            chunk_elems: budget.index_chunk_elems(plan.indices_last_dim),
            plan,
            arena: StagingArena::new(budget),
            mover: DataMover::new(),
            vector: VectorUnit::new(),
        }
    }

    fn visit(
        &mut self,
        unit: usize,
        window: &mut [T],
        inputs: &LaunchInputs<'_, T>,
        chunk: IndexChunk,
        report: &mut UnitReport,
    ) {
        let mut ctx = UnitCtx {
            plan: &self.plan,
            budget: inputs.budget,
            gate: RangeGate::new(unit, self.plan.index_step),
            out: window,
            adds: inputs.adds,
            indices: inputs.indices,
            mover: &mut self.mover,
            vector: &mut self.vector,
            check_partition: inputs.check_partition,
        };
        let mut stage = self.arena.stage();
        let delta = accumulate_chunk(&mut ctx, &mut stage, chunk);
        report.chunks += 1;
        report.delta.merge(&delta);
    }
}

/// Run unit `unit` over its output `window`.
pub(crate) fn run_unit<T: ScatterElement>(
    unit: usize,
    window: &mut [T],
    inputs: &LaunchInputs<'_, T>,
) -> Result<UnitReport, KernelError> {
    let mut report = UnitReport { unit, ..Default::default() };
    let mut worker: Option<Worker<T>> = None;
    let mut state = UnitState::Init;

    loop {
        let next = match state {
            UnitState::Init => UnitState::DecodeTiling,
            UnitState::DecodeTiling => {
                let plan = TilingPlan::decode(inputs.tiling)?;
                if plan.unit_active(unit) {
                    report.active = true;
                    worker = Some(Worker::new(plan, inputs.budget));
                    UnitState::first_chunk(&plan)
                } else {
                    UnitState::Done
                }
            }
            UnitState::FullChunks { next } => {
                let Some(w) = worker.as_mut() else { break };
                let chunk = IndexChunk { offset: next * w.chunk_elems, len: w.chunk_elems };
                w.visit(unit, window, inputs, chunk, &mut report);
                UnitState::after_full_chunk(next, &w.plan)
            }
            UnitState::RemainderChunk => {
                let Some(w) = worker.as_mut() else { break };
                let chunk = IndexChunk {
                    offset: w.plan.indices_loop_count * w.chunk_elems,
                    len: w.plan.indices_last_count,
                };
                w.visit(unit, window, inputs, chunk, &mut report);
                UnitState::Done
            }
            UnitState::Done => break,
        };
        log::trace!("unit {unit}: {state:?} -> {next:?}");
        state = next;
    }

    if let Some(w) = &worker {
        report.vector = w.vector.stats();
        report.transfers = w.mover.stats();
        report.stages_released = w.arena.released();
    }
    Ok(report)
}
