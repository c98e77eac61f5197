//! Unified-buffer staging and block transfers.
//!
//! Each execution unit owns a [`StagingArena`]: fixed-size scratch buffers
//! carved from the usable unified buffer. A chunk of work borrows them as a
//! [`Stage`]; dropping the stage releases it. Data moves between global
//! memory and staging only in whole blocks through [`DataMover`].

use aicore_common::{DType, SocConfig};
use serde::Serialize;

use crate::element::Element;

/// Bytes of an index element (indices are always `int32`).
const INDEX_BYTES: usize = 4;

/// The unified buffer is split into 96-byte shares: 32 for staged updates,
/// 32 for the working copy of the target and 32 for indices.
const UB_SHARE: usize = 96;
const UB_PART: usize = 32;

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Element capacities of the staging buffers for one dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StagingBudget {
    /// Capacity of the updates buffer (and the target working copy), in elements.
    pub adds_elems: usize,
    /// Capacity of the indices buffer, in `int32` elements.
    pub indices_elems: usize,
    /// Elements of the kernel dtype per block.
    pub block_elems: usize,
    /// `int32` elements per block.
    pub index_block_elems: usize,
}

impl StagingBudget {
    pub fn new(soc: &SocConfig, dtype: DType) -> Self {
        let part_bytes = soc.usable_ub_bytes() / UB_SHARE * UB_PART;
        let block_elems = soc.block_elems(dtype).max(1);
        let index_block_elems = (soc.block_bytes / INDEX_BYTES).max(1);
        let adds_elems = part_bytes / dtype.size_in_bytes() / block_elems * block_elems;
        let indices_elems = part_bytes / INDEX_BYTES / index_block_elems * index_block_elems;
        Self { adds_elems, indices_elems, block_elems, index_block_elems }
    }

    /// `ub_size` published in compile info: the two data shares, in bytes.
    pub fn compile_info_ub_size(soc: &SocConfig) -> usize {
        soc.usable_ub_bytes() / UB_SHARE * (UB_PART * 2)
    }

    /// Indices staged per chunk: whole tuples of `last_dim` coordinates only.
    pub fn index_chunk_elems(&self, last_dim: usize) -> usize {
        if last_dim == 0 {
            return 0;
        }
        self.indices_elems / last_dim * last_dim
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Scratch buffers owned by one execution unit.
#[derive(Debug)]
pub struct StagingArena<T> {
    indices: Vec<i32>,
    adds: Vec<T>,
    var: Vec<T>,
    adds_tile: Vec<T>,
    var_tile: Vec<T>,
    released: u64,
}

impl<T: Element> StagingArena<T> {
    pub fn new(budget: &StagingBudget) -> Self {
        Self {
            indices: vec![0; budget.indices_elems],
            adds: vec![T::default(); budget.adds_elems],
            var: vec![T::default(); budget.adds_elems],
            adds_tile: vec![T::default(); budget.block_elems],
            var_tile: vec![T::default(); budget.block_elems],
            released: 0,
        }
    }

    /// Borrow every buffer for one chunk of work.
    pub fn stage(&mut self) -> Stage<'_, T> {
        Stage {
            indices: &mut self.indices,
            adds: &mut self.adds,
            var: &mut self.var,
            adds_tile: &mut self.adds_tile,
            var_tile: &mut self.var_tile,
            released: &mut self.released,
        }
    }

    /// Number of stages that have been released so far.
    pub fn released(&self) -> u64 {
        self.released
    }
}

/// Buffers borrowed for a single chunk. Released on drop.
#[derive(Debug)]
pub struct Stage<'a, T> {
    pub indices: &'a mut [i32],
    pub adds: &'a mut [T],
    pub var: &'a mut [T],
    pub adds_tile: &'a mut [T],
    pub var_tile: &'a mut [T],
    released: &'a mut u64,
}

impl<T> Drop for Stage<'_, T> {
    fn drop(&mut self) {
        *self.released += 1;
    }
}

// ---------------------------------------------------------------------------
// Block transfers
// ---------------------------------------------------------------------------

/// Transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub moves_in: u64,
    pub moves_out: u64,
    pub blocks_in: u64,
    pub blocks_out: u64,
}

/// Whole-block copies between global memory and staging.
#[derive(Debug, Default)]
pub struct DataMover {
    stats: TransferStats,
}

impl DataMover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Copy `blocks` blocks of `block_elems` from `gm[start..]` into the front
    /// of `ub`. Lanes past the end of `gm` read as zero.
    pub fn copy_in<T: Copy + Default>(
        &mut self,
        ub: &mut [T],
        gm: &[T],
        start: usize,
        blocks: usize,
        block_elems: usize,
    ) {
        let len = (blocks * block_elems).min(ub.len());
        debug_assert!(blocks * block_elems <= ub.len(), "transfer larger than staging buffer");
        let avail = gm.len().saturating_sub(start).min(len);
        if avail > 0 {
            ub[..avail].copy_from_slice(&gm[start..start + avail]);
        }
        ub[avail..len].fill(T::default());
        self.stats.moves_in += 1;
        self.stats.blocks_in += blocks as u64;
    }

    /// Copy `blocks` blocks from the front of `ub` to `gm[start..]`.
    /// Lanes past the end of `gm` are dropped.
    pub fn copy_out<T: Copy>(
        &mut self,
        gm: &mut [T],
        start: usize,
        ub: &[T],
        blocks: usize,
        block_elems: usize,
    ) {
        let len = (blocks * block_elems).min(ub.len());
        let avail = gm.len().saturating_sub(start).min(len);
        if avail > 0 {
            gm[start..start + avail].copy_from_slice(&ub[..avail]);
        }
        self.stats.moves_out += 1;
        self.stats.blocks_out += blocks as u64;
    }
}
