//! Vector-unit model.
//!
//! The vector unit processes at most [`VECTOR_BYTES`] per repeat and at most
//! [`MAX_REPEAT`] repeats per instruction. Large element counts are issued
//! as batches of full-mask instructions followed by a partial-mask remainder.
//! [`VectorUnit`] reproduces that batching and counts what it issued so that
//! tests and launch reports can observe the instruction stream.

use crate::element::ScatterElement;
use serde::Serialize;
use std::ops::Range;

/// Bytes processed by one repeat of a vector instruction.
pub const VECTOR_BYTES: usize = aicore_common::MAX_BLOCK_BYTES;

/// Largest repeat count a single vector instruction accepts.
pub const MAX_REPEAT: usize = 255;

/// Counters for the instructions a unit issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VectorStats {
    /// Vector add instructions issued.
    pub instructions: u64,
    /// Repeats across all instructions.
    pub repeats: u64,
    /// Lanes that were actually updated.
    pub lanes: u64,
    /// Width conversions (narrow int <-> f16) issued.
    pub conversions: u64,
}

/// Per-unit vector pipeline.
#[derive(Debug, Default)]
pub struct VectorUnit {
    stats: VectorStats,
}

impl VectorUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lanes covered by one full-mask repeat for `T`.
    pub fn mask_lanes<T: ScatterElement>() -> usize {
        VECTOR_BYTES / T::DTYPE.size_in_bytes()
    }

    pub fn stats(&self) -> VectorStats {
        self.stats
    }

    /// `dst[i] += src[i]` for `i < count`.
    ///
    /// Issues `count / (mask * 255)` full batches, then the remaining full
    /// repeats, then one partial-mask repeat for the leftover lanes.
    pub fn vec_add<T: ScatterElement>(&mut self, dst: &mut [T], src: &[T], count: usize) {
        let count = count.min(dst.len()).min(src.len());
        if count == 0 {
            return;
        }
        let mask = Self::mask_lanes::<T>();
        let repeats = count / mask;
        let remainder = count % mask;

        let batch = mask * MAX_REPEAT;
        let mut offset = 0;
        for _ in 0..repeats / MAX_REPEAT {
            self.issue(dst, src, offset..offset + batch, MAX_REPEAT);
            offset += batch;
        }
        let tail_repeats = repeats % MAX_REPEAT;
        if tail_repeats > 0 {
            self.issue(dst, src, offset..offset + tail_repeats * mask, tail_repeats);
            offset += tail_repeats * mask;
        }
        if remainder > 0 {
            self.issue(dst, src, offset..offset + remainder, 1);
        }
    }

    /// Single masked instruction: `dst[i] += src[i]` for `i` in `lanes` only.
    ///
    /// Lanes outside the mask keep their values. Used for tail blocks where
    /// only the last few lanes belong to the current piece.
    pub fn vec_add_masked<T: ScatterElement>(&mut self, dst: &mut [T], src: &[T], lanes: Range<usize>) {
        let end = lanes.end.min(dst.len()).min(src.len());
        if lanes.start >= end {
            return;
        }
        debug_assert!(end - lanes.start <= Self::mask_lanes::<T>());
        self.issue(dst, src, lanes.start..end, 1);
    }

    fn issue<T: ScatterElement>(&mut self, dst: &mut [T], src: &[T], range: Range<usize>, repeats: usize) {
        let lanes = range.len() as u64;
        for (d, s) in dst[range.clone()].iter_mut().zip(&src[range]) {
            *d = d.vadd(*s);
        }
        self.stats.instructions += 1;
        self.stats.repeats += repeats as u64;
        self.stats.lanes += lanes;
        if T::DTYPE.is_narrow_int() {
            // widen dst, widen src, narrow the sum
            self.stats.conversions += 3;
        }
    }
}
