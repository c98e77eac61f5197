//! Accumulation engine.
//!
//! One chunk of indices at a time: stage the chunk, resolve every tuple,
//! and for tuples the unit's gate accepts add the matching update row into
//! the output. How a row moves through staging depends on the tiling mode;
//! [`strategy`] picks the per-target routine once per chunk.

use serde::Serialize;
use std::ops::Range;

use super::gate::RangeGate;
use super::resolver::IndexResolver;
use super::tiling::{TilingMode, TilingPlan};
use crate::element::ScatterElement;
use crate::staging::{DataMover, Stage, StagingBudget};
use crate::vector::VectorUnit;

/// Contiguous run of index elements in global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChunk {
    /// First index element of the chunk.
    pub offset: usize,
    /// Index elements in the chunk.
    pub len: usize,
}

/// What one chunk contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkDelta {
    pub tuples_seen: u64,
    pub tuples_owned: u64,
    pub elements_accumulated: u64,
}

impl ChunkDelta {
    pub fn merge(&mut self, other: &ChunkDelta) {
        self.tuples_seen += other.tuples_seen;
        self.tuples_owned += other.tuples_owned;
        self.elements_accumulated += other.elements_accumulated;
    }
}

/// Everything a unit touches while accumulating.
///
/// `out` is the unit's window of the output buffer: offset 0 of the window
/// is the first offset the gate owns.
pub(crate) struct UnitCtx<'a, T> {
    pub plan: &'a TilingPlan,
    pub budget: &'a StagingBudget,
    pub gate: RangeGate,
    pub out: &'a mut [T],
    pub adds: &'a [T],
    pub indices: &'a [i32],
    pub mover: &'a mut DataMover,
    pub vector: &'a mut VectorUnit,
    pub check_partition: bool,
}

/// Per-target routine: `(ctx, stage, tuple ordinal, local target offset)`.
type TargetFn<T> = fn(&mut UnitCtx<'_, T>, &mut Stage<'_, T>, usize, usize);

/// Routine for `mode`.
fn strategy<T: ScatterElement>(mode: TilingMode) -> TargetFn<T> {
    match mode {
        TilingMode::AlignedResident => aligned_resident::<T>,
        TilingMode::AlignedStreamed => aligned_streamed::<T>,
        TilingMode::SmallResident => small_resident::<T>,
        TilingMode::SmallStreamed => small_streamed::<T>,
        TilingMode::UnalignedStreamed => unaligned_streamed::<T>,
    }
}

/// Process one chunk of index tuples.
pub(crate) fn accumulate_chunk<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    chunk: IndexChunk,
) -> ChunkDelta {
    let plan = ctx.plan;
    let budget = ctx.budget;
    let k = plan.indices_last_dim;
    let w = plan.update_width;

    let idx_blocks = chunk.len.div_ceil(budget.index_block_elems);
    ctx.mover.copy_in(stage.indices, ctx.indices, chunk.offset, idx_blocks, budget.index_block_elems);

    if plan.mode.is_resident() {
        let blocks = plan.adds_num.div_ceil(budget.block_elems);
        ctx.mover.copy_in(stage.adds, ctx.adds, 0, blocks, budget.block_elems);
    }

    let accumulate = strategy::<T>(plan.mode);
    let resolver = IndexResolver::new(plan.strides());
    let tuples = (chunk.len / k).min(plan.indices_front_dim);
    let first_ordinal = chunk.offset / k;

    let mut delta = ChunkDelta::default();
    for t in 0..tuples {
        delta.tuples_seen += 1;
        let flat = resolver.resolve(stage.indices, t * k);
        if !ctx.gate.owns(flat) {
            continue;
        }
        let local = ctx.gate.local(flat);
        if ctx.check_partition {
            check_span(&ctx.gate, local, w);
        }
        accumulate(ctx, stage, first_ordinal + t, local);
        delta.tuples_owned += 1;
        delta.elements_accumulated += w as u64;
    }
    log::trace!(
        "chunk at {}: {} tuples, {} owned",
        chunk.offset,
        delta.tuples_seen,
        delta.tuples_owned
    );
    delta
}

/// A target accepted by the gate must end inside the same unit's range.
fn check_span(gate: &RangeGate, local: usize, width: usize) {
    let range = gate.range();
    assert!(
        local + width <= gate.step(),
        "target at {} spans {} elements past the end of owned range {:?}",
        range.start + local,
        width,
        range
    );
}

// ---------------------------------------------------------------------------
// Block-aligned rows
// ---------------------------------------------------------------------------

fn aligned_resident<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    ordinal: usize,
    local: usize,
) {
    let w = ctx.plan.update_width;
    let block = ctx.budget.block_elems;
    let src = ordinal * w;
    let Some(row) = stage.adds.get(src..src + w) else {
        return;
    };
    ctx.mover.copy_in(stage.var, ctx.out, local, w / block, block);
    ctx.vector.vec_add(stage.var, row, w);
    ctx.mover.copy_out(ctx.out, local, stage.var, w / block, block);
}

fn aligned_streamed<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    ordinal: usize,
    local: usize,
) {
    let src = ordinal * ctx.plan.update_width;
    for piece in pieces(ctx.plan, ctx.budget.adds_elems) {
        accumulate_blocks(ctx, stage, src + piece.start, local + piece.start, piece.len());
    }
}

/// Piece ranges of one row: full-capacity pieces, then the remainder.
fn pieces(plan: &TilingPlan, capacity: usize) -> impl Iterator<Item = Range<usize>> {
    let full = plan.updates_loop_count;
    let last = plan.updates_last_count;
    (0..full)
        .map(move |p| p * capacity..(p + 1) * capacity)
        .chain((last > 0).then(|| full * capacity..full * capacity + last))
}

/// Add the whole blocks of `n` elements at `src` (updates) into `dst`
/// (window). Lanes past the last whole block are left alone.
fn accumulate_blocks<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    src: usize,
    dst: usize,
    n: usize,
) {
    let block = ctx.budget.block_elems;
    let blocks = n / block;
    if blocks == 0 {
        return;
    }
    ctx.mover.copy_in(stage.adds, ctx.adds, src, blocks, block);
    ctx.mover.copy_in(stage.var, ctx.out, dst, blocks, block);
    ctx.vector.vec_add(stage.var, stage.adds, blocks * block);
    ctx.mover.copy_out(ctx.out, dst, stage.var, blocks, block);
}

// ---------------------------------------------------------------------------
// Single-block tiles
// ---------------------------------------------------------------------------

/// Load the block at `dst`, add `lanes` of the block at `src`, store the block.
fn accumulate_tile<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    src: usize,
    dst: usize,
    lanes: Range<usize>,
) {
    let block = ctx.budget.block_elems;
    ctx.mover.copy_in(stage.var_tile, ctx.out, dst, 1, block);
    ctx.mover.copy_in(stage.adds_tile, ctx.adds, src, 1, block);
    ctx.vector.vec_add_masked(stage.var_tile, stage.adds_tile, lanes);
    ctx.mover.copy_out(ctx.out, dst, stage.var_tile, 1, block);
}

fn small_resident<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    ordinal: usize,
    local: usize,
) {
    let w = ctx.plan.update_width.min(ctx.budget.block_elems);
    let block = ctx.budget.block_elems;
    let src = ordinal * ctx.plan.update_width;
    let Some(row) = stage.adds.get(src..src + w) else {
        return;
    };
    stage.adds_tile[..w].copy_from_slice(row);
    ctx.mover.copy_in(stage.var_tile, ctx.out, local, 1, block);
    ctx.vector.vec_add_masked(stage.var_tile, stage.adds_tile, 0..w);
    ctx.mover.copy_out(ctx.out, local, stage.var_tile, 1, block);
}

fn small_streamed<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    ordinal: usize,
    local: usize,
) {
    let w = ctx.plan.update_width.min(ctx.budget.block_elems);
    accumulate_tile(ctx, stage, ordinal * ctx.plan.update_width, local, 0..w);
}

// ---------------------------------------------------------------------------
// Unaligned rows
// ---------------------------------------------------------------------------

/// Whole blocks of every piece go through [`accumulate_blocks`]. The `r`
/// trailing elements of a piece are added through a tile holding the last
/// full block of the row, with only its final `r` lanes enabled, so nothing
/// past the row end is read into the sum or written with new data.
fn unaligned_streamed<T: ScatterElement>(
    ctx: &mut UnitCtx<'_, T>,
    stage: &mut Stage<'_, T>,
    ordinal: usize,
    local: usize,
) {
    let block = ctx.budget.block_elems;
    let src = ordinal * ctx.plan.update_width;
    for piece in pieces(ctx.plan, ctx.budget.adds_elems) {
        let n = piece.len();
        accumulate_blocks(ctx, stage, src + piece.start, local + piece.start, n);

        let r = n % block;
        if r == 0 {
            continue;
        }
        match piece.end.checked_sub(block) {
            Some(tile_start) => {
                accumulate_tile(ctx, stage, src + tile_start, local + tile_start, block - r..block)
            }
            // row narrower than a block
            None => accumulate_tile(ctx, stage, src, local, piece),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::StagingArena;

    fn budget(adds_elems: usize) -> StagingBudget {
        StagingBudget { adds_elems, indices_elems: 64, block_elems: 8, index_block_elems: 8 }
    }

    fn run(
        plan: &TilingPlan,
        budget: &StagingBudget,
        out: &mut [f32],
        adds: &[f32],
        indices: &[i32],
    ) -> ChunkDelta {
        let mut arena = StagingArena::<f32>::new(budget);
        let mut stage = arena.stage();
        let mut mover = DataMover::new();
        let mut vector = VectorUnit::new();
        let mut ctx = UnitCtx {
            plan,
            budget,
            gate: RangeGate::new(0, plan.index_step),
            out,
            adds,
            indices,
            mover: &mut mover,
            vector: &mut vector,
            check_partition: true,
        };
        accumulate_chunk(&mut ctx, &mut stage, IndexChunk { offset: 0, len: indices.len() })
    }

    fn plan(mode: TilingMode, step: usize, w: usize, front: usize, loops: usize, last: usize) -> TilingPlan {
        TilingPlan::new(mode, step, 1, w, 0, front, front * w, loops, last, &[w as i64], front)
            .unwrap()
    }

    #[test]
    fn aligned_resident_adds_rows() {
        let p = plan(TilingMode::AlignedResident, 32, 8, 2, 0, 8);
        let mut out = vec![0.0f32; 32];
        let adds: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let delta = run(&p, &budget(64), &mut out, &adds, &[3, 1]);
        assert_eq!(delta.tuples_owned, 2);
        assert_eq!(&out[24..32], &adds[0..8]);
        assert_eq!(&out[8..16], &adds[8..16]);
        assert!(out[..8].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn aligned_streamed_walks_pieces() {
        // width 24 with capacity 16: one full piece and an 8-element piece
        let p = plan(TilingMode::AlignedStreamed, 48, 24, 1, 1, 8);
        let mut out = vec![1.0f32; 48];
        let adds = vec![2.0f32; 24];
        run(&p, &budget(16), &mut out, &adds, &[1]);
        assert!(out[..24].iter().all(|&v| v == 1.0));
        assert!(out[24..].iter().all(|&v| v == 3.0));
    }

    #[test]
    fn unaligned_tail_stays_inside_target() {
        // width 11 = one block + 3 tail lanes; neighbours must stay untouched
        let p = plan(TilingMode::UnalignedStreamed, 44, 11, 1, 0, 11);
        let mut out = vec![5.0f32; 44];
        let adds = vec![1.0f32; 11];
        run(&p, &budget(64), &mut out, &adds, &[1]);
        assert!(out[..11].iter().all(|&v| v == 5.0));
        assert!(out[11..22].iter().all(|&v| v == 6.0));
        assert!(out[22..].iter().all(|&v| v == 5.0));
    }

    #[test]
    fn unaligned_pieces_with_capacity_split() {
        // width 21, capacity 16: piece 0..16 (aligned), piece 16..21 (tail only)
        let p = plan(TilingMode::UnalignedStreamed, 42, 21, 2, 1, 5);
        let mut out = vec![0.0f32; 42];
        let adds: Vec<f32> = (0..42).map(|v| v as f32).collect();
        run(&p, &budget(16), &mut out, &adds, &[1, 0]);
        assert_eq!(&out[21..42], &adds[0..21]);
        assert_eq!(&out[0..21], &adds[21..42]);
    }

    #[test]
    fn small_modes_touch_only_target_lanes() {
        for mode in [TilingMode::SmallResident, TilingMode::SmallStreamed] {
            let p = plan(mode, 12, 3, 2, 0, 3);
            let mut out = vec![0.0f32; 12];
            let adds = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
            run(&p, &budget(64), &mut out, &adds, &[2, 2]);
            assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 11.0, 22.0, 33.0, 0.0, 0.0, 0.0], "{mode}");
        }
    }

    #[test]
    fn foreign_offsets_are_skipped() {
        let p = plan(TilingMode::AlignedStreamed, 16, 8, 2, 0, 8);
        let mut out = vec![0.0f32; 16];
        let delta = run(&p, &budget(64), &mut out, &[1.0; 16], &[5, -1]);
        assert_eq!(delta.tuples_seen, 2);
        assert_eq!(delta.tuples_owned, 0);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "past the end of owned range")]
    fn span_crossing_range_end_is_caught() {
        // step 12 does not cover two 8-wide rows
        let p = plan(TilingMode::AlignedStreamed, 12, 8, 1, 0, 8);
        let mut out = vec![0.0f32; 24];
        run(&p, &budget(64), &mut out, &[1.0; 8], &[1]);
    }
}
