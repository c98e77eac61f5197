//! Tiling blob layout.
//!
//! The host-side planner hands every execution unit the same block of
//! [`TILING_ARG_NUM`] signed 64-bit integers. Fields by position:
//!
//! | slot  | field                |
//! |-------|----------------------|
//! | 0     | mode                 |
//! | 1     | index step           |
//! | 2     | core count           |
//! | 3     | update width         |
//! | 4     | indices loop count   |
//! | 5     | indices last count   |
//! | 6     | adds num             |
//! | 7     | updates loop count   |
//! | 8     | updates last count   |
//! | 9-15  | strides              |
//! | 16    | indices last dim     |
//! | 17    | indices front dim    |
//! | 18-23 | reserved (zero)      |

use aicore_common::KernelError;
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Number of `i64` slots in a tiling blob.
pub const TILING_ARG_NUM: usize = 24;

/// Largest supported index-tuple length.
pub const MAX_INDEX_RANK: usize = 7;

const SLOT_MODE: usize = 0;
const SLOT_INDEX_STEP: usize = 1;
const SLOT_CORE_COUNT: usize = 2;
const SLOT_UPDATE_WIDTH: usize = 3;
const SLOT_INDICES_LOOP: usize = 4;
const SLOT_INDICES_LAST: usize = 5;
const SLOT_ADDS_NUM: usize = 6;
const SLOT_UPDATES_LOOP: usize = 7;
const SLOT_UPDATES_LAST: usize = 8;
const SLOT_STRIDES: usize = 9;
const SLOT_LAST_DIM: usize = 16;
const SLOT_FRONT_DIM: usize = 17;

/// Accumulation strategy selected by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingMode {
    /// Width is block-aligned and every update row fits in staging.
    AlignedResident = 1,
    /// Width is block-aligned; rows stream through staging piece by piece.
    AlignedStreamed = 2,
    /// Width below one block; all update rows staged once.
    SmallResident = 3,
    /// Width below one block; each row read from global memory per target.
    SmallStreamed = 4,
    /// Unaligned width of at least one block; streamed with a tail block.
    UnalignedStreamed = 5,
}

impl TilingMode {
    pub const ALL: [TilingMode; 5] = [
        Self::AlignedResident,
        Self::AlignedStreamed,
        Self::SmallResident,
        Self::SmallStreamed,
        Self::UnalignedStreamed,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    /// Modes that stage every update row once per index chunk.
    pub fn is_resident(self) -> bool {
        matches!(self, Self::AlignedResident | Self::SmallResident)
    }

    /// Modes that operate on one-block tiles and run on a single unit.
    pub fn is_small(self) -> bool {
        matches!(self, Self::SmallResident | Self::SmallStreamed)
    }
}

impl TryFrom<i64> for TilingMode {
    type Error = KernelError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|m| m.code() == code)
            .ok_or_else(|| invalid(format!("unknown tiling mode {code}")))
    }
}

impl fmt::Display for TilingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AlignedResident => "aligned_resident",
            Self::AlignedStreamed => "aligned_streamed",
            Self::SmallResident => "small_resident",
            Self::SmallStreamed => "small_streamed",
            Self::UnalignedStreamed => "unaligned_streamed",
        };
        write!(f, "{name}({})", self.code())
    }
}

/// Decoded tiling blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TilingPlan {
    pub mode: TilingMode,
    /// Length of the flat output range owned by each unit.
    pub index_step: usize,
    /// Units that carry work.
    pub core_count: usize,
    /// Contiguous elements per update row.
    pub update_width: usize,
    /// Full index chunks.
    pub indices_loop_count: usize,
    /// Index elements in the final partial chunk.
    pub indices_last_count: usize,
    /// Total update elements.
    pub adds_num: usize,
    /// Full-capacity pieces per update row.
    pub updates_loop_count: usize,
    /// Elements in the final piece of a row.
    pub updates_last_count: usize,
    strides: [i64; MAX_INDEX_RANK],
    /// Index-tuple length.
    pub indices_last_dim: usize,
    /// Number of index tuples.
    pub indices_front_dim: usize,
}

impl TilingPlan {
    /// Build a plan from its fields. `strides.len()` becomes the index-tuple length.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: TilingMode,
        index_step: usize,
        core_count: usize,
        update_width: usize,
        indices_loop_count: usize,
        indices_last_count: usize,
        adds_num: usize,
        updates_loop_count: usize,
        updates_last_count: usize,
        strides: &[i64],
        indices_front_dim: usize,
    ) -> Result<Self, KernelError> {
        if strides.is_empty() || strides.len() > MAX_INDEX_RANK {
            return Err(invalid(format!(
                "index tuple length {} outside 1..={MAX_INDEX_RANK}",
                strides.len()
            )));
        }
        let mut packed = [0i64; MAX_INDEX_RANK];
        packed[..strides.len()].copy_from_slice(strides);
        let plan = Self {
            mode,
            index_step,
            core_count,
            update_width,
            indices_loop_count,
            indices_last_count,
            adds_num,
            updates_loop_count,
            updates_last_count,
            strides: packed,
            indices_last_dim: strides.len(),
            indices_front_dim,
        };
        plan.check()?;
        Ok(plan)
    }

    /// Decode a blob; fails on truncation or out-of-range fields.
    pub fn decode(blob: &[i64]) -> Result<Self, KernelError> {
        if blob.len() < TILING_ARG_NUM {
            return Err(invalid(format!(
                "tiling blob holds {} values, expected {TILING_ARG_NUM}",
                blob.len()
            )));
        }
        let mode = TilingMode::try_from(blob[SLOT_MODE])?;
        let field = |slot: usize, name: &str| -> Result<usize, KernelError> {
            usize::try_from(blob[slot])
                .map_err(|_| invalid(format!("{name} is negative ({})", blob[slot])))
        };

        let last_dim = field(SLOT_LAST_DIM, "indices last dim")?;
        if last_dim == 0 || last_dim > MAX_INDEX_RANK {
            return Err(invalid(format!("indices last dim {last_dim} outside 1..={MAX_INDEX_RANK}")));
        }
        let mut strides = [0i64; MAX_INDEX_RANK];
        strides[..last_dim].copy_from_slice(&blob[SLOT_STRIDES..SLOT_STRIDES + last_dim]);

        let plan = Self {
            mode,
            index_step: field(SLOT_INDEX_STEP, "index step")?,
            core_count: field(SLOT_CORE_COUNT, "core count")?,
            update_width: field(SLOT_UPDATE_WIDTH, "update width")?,
            indices_loop_count: field(SLOT_INDICES_LOOP, "indices loop count")?,
            indices_last_count: field(SLOT_INDICES_LAST, "indices last count")?,
            adds_num: field(SLOT_ADDS_NUM, "adds num")?,
            updates_loop_count: field(SLOT_UPDATES_LOOP, "updates loop count")?,
            updates_last_count: field(SLOT_UPDATES_LAST, "updates last count")?,
            strides,
            indices_last_dim: last_dim,
            indices_front_dim: field(SLOT_FRONT_DIM, "indices front dim")?,
        };
        plan.check()?;
        Ok(plan)
    }

    fn check(&self) -> Result<(), KernelError> {
        if self.index_step == 0 {
            return Err(invalid("index step must be positive".to_string()));
        }
        if self.update_width == 0 {
            return Err(invalid("update width must be positive".to_string()));
        }
        Ok(())
    }

    /// Encode into a blob; reserved slots are zero.
    pub fn encode(&self) -> [i64; TILING_ARG_NUM] {
        let mut blob = [0i64; TILING_ARG_NUM];
        blob[SLOT_MODE] = self.mode.code();
        blob[SLOT_INDEX_STEP] = self.index_step as i64;
        blob[SLOT_CORE_COUNT] = self.core_count as i64;
        blob[SLOT_UPDATE_WIDTH] = self.update_width as i64;
        blob[SLOT_INDICES_LOOP] = self.indices_loop_count as i64;
        blob[SLOT_INDICES_LAST] = self.indices_last_count as i64;
        blob[SLOT_ADDS_NUM] = self.adds_num as i64;
        blob[SLOT_UPDATES_LOOP] = self.updates_loop_count as i64;
        blob[SLOT_UPDATES_LAST] = self.updates_last_count as i64;
        blob[SLOT_STRIDES..SLOT_STRIDES + MAX_INDEX_RANK].copy_from_slice(&self.strides);
        blob[SLOT_LAST_DIM] = self.indices_last_dim as i64;
        blob[SLOT_FRONT_DIM] = self.indices_front_dim as i64;
        blob
    }

    /// Element strides of the leading indexed dimensions.
    pub fn strides(&self) -> &[i64] {
        &self.strides[..self.indices_last_dim]
    }

    /// Whether unit `unit` has work under this plan. With a core count of
    /// zero or one only unit 0 runs.
    pub fn unit_active(&self, unit: usize) -> bool {
        if self.core_count <= 1 { unit == 0 } else { unit < self.core_count }
    }

    /// Flat output range owned by `unit`. Saturates instead of overflowing.
    pub fn unit_range(&self, unit: usize) -> Range<usize> {
        let lo = unit.saturating_mul(self.index_step);
        lo..lo.saturating_add(self.index_step)
    }

    /// Total index elements described by the chunk counts, or `None` when
    /// the counts overflow.
    pub fn indices_len(&self, chunk_elems: usize) -> Option<usize> {
        self.indices_loop_count.checked_mul(chunk_elems)?.checked_add(self.indices_last_count)
    }
}

fn invalid(reason: String) -> KernelError {
    KernelError::InvalidTiling { reason }
}
