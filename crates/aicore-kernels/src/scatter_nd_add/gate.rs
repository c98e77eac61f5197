//! Ownership test for flat offsets.

use std::ops::Range;

/// Accepts offsets inside `[unit * step, (unit + 1) * step)`.
///
/// Ranges of distinct units never intersect, so each target row is accumulated
/// by at most one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeGate {
    range: Range<usize>,
}

impl RangeGate {
    pub fn new(unit: usize, step: usize) -> Self {
        let lo = unit.saturating_mul(step);
        Self { range: lo..lo.saturating_add(step) }
    }

    #[inline]
    pub fn owns(&self, flat: i64) -> bool {
        usize::try_from(flat).is_ok_and(|f| self.range.contains(&f))
    }

    /// Offset relative to the start of the owned range. Only meaningful for
    /// offsets that [`owns`](Self::owns) accepted.
    #[inline]
    pub fn local(&self, flat: i64) -> usize {
        (flat as usize).wrapping_sub(self.range.start)
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Length of the owned range.
    pub fn step(&self) -> usize {
        self.range.len()
    }
}
