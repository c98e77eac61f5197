//! Host-side reference planner.
//!
//! Production plans come from an external shape-inference pass. This planner
//! derives an equivalent plan from static shapes so that tests and the CLI
//! can drive the kernel end to end.

use aicore_common::{DType, KernelError, SocConfig};

use super::tiling::{MAX_INDEX_RANK, TilingMode, TilingPlan};
use crate::staging::StagingBudget;

/// Builds tiling plans for one dtype on one platform.
#[derive(Debug, Clone)]
pub struct ScatterNdAddPlanner {
    dtype: DType,
    core_num: usize,
    budget: StagingBudget,
}

impl ScatterNdAddPlanner {
    pub fn new(soc: &SocConfig, dtype: DType) -> Self {
        Self { dtype, core_num: soc.core_num.max(1), budget: StagingBudget::new(soc, dtype) }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn budget(&self) -> &StagingBudget {
        &self.budget
    }

    /// Plan `var[indices] += adds` for the given shapes.
    ///
    /// `indices_shape` is `[..., k]`; each tuple addresses the first `k`
    /// dimensions of `var`, and the implied updates shape is
    /// `indices_shape[..-1] ++ var_shape[k..]`.
    pub fn plan(&self, var_shape: &[usize], indices_shape: &[usize]) -> Result<TilingPlan, KernelError> {
        let Some((&k, front_dims)) = indices_shape.split_last() else {
            return Err(invalid("indices must have rank of at least 1".to_string()));
        };
        if k == 0 || k > MAX_INDEX_RANK || k > var_shape.len() {
            return Err(invalid(format!(
                "index tuple length {k} must be in 1..={} for var of rank {}",
                MAX_INDEX_RANK.min(var_shape.len()),
                var_shape.len()
            )));
        }
        if var_shape.contains(&0) {
            return Err(invalid("var must not be empty".to_string()));
        }

        let update_width: usize = var_shape[k..].iter().product();
        let rows: usize = var_shape[..k].iter().product();
        let front: usize = front_dims.iter().product();
        let adds_num = front * update_width;

        let strides = row_major_strides(&var_shape[..k], update_width);
        let mode = self.select_mode(update_width, adds_num);

        let (index_step, core_count) = if mode.is_small() {
            (rows * update_width, 1)
        } else {
            let rows_per_core = rows.div_ceil(self.core_num);
            (rows_per_core * update_width, rows.div_ceil(rows_per_core))
        };

        let capacity = self.budget.adds_elems.max(1);
        let chunk = self.budget.index_chunk_elems(k).max(1);
        let total_indices = front * k;

        let plan = TilingPlan::new(
            mode,
            index_step,
            core_count,
            update_width,
            total_indices / chunk,
            total_indices % chunk,
            adds_num,
            update_width / capacity,
            update_width % capacity,
            &strides,
            front,
        )?;
        log::debug!(
            "planned {} for var {:?} indices {:?}: step {}, {} cores",
            plan.mode,
            var_shape,
            indices_shape,
            plan.index_step,
            plan.core_count
        );
        Ok(plan)
    }

    fn select_mode(&self, update_width: usize, adds_num: usize) -> TilingMode {
        let block = self.budget.block_elems;
        let fits = adds_num <= self.budget.adds_elems;
        if update_width % block == 0 {
            if fits { TilingMode::AlignedResident } else { TilingMode::AlignedStreamed }
        } else if update_width < block {
            if fits { TilingMode::SmallResident } else { TilingMode::SmallStreamed }
        } else {
            TilingMode::UnalignedStreamed
        }
    }
}

/// Element strides of the indexed dimensions, for rows of `width` elements.
pub fn row_major_strides(indexed_dims: &[usize], width: usize) -> Vec<i64> {
    let mut strides = vec![0i64; indexed_dims.len()];
    let mut acc = width as i64;
    for (stride, &dim) in strides.iter_mut().zip(indexed_dims).rev() {
        *stride = acc;
        acc *= dim as i64;
    }
    strides
}

fn invalid(reason: String) -> KernelError {
    KernelError::InvalidArguments { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soc(core_num: usize) -> SocConfig {
        SocConfig { core_num, ..SocConfig::default() }
    }

    #[test]
    fn strides_are_row_major() {
        assert_eq!(row_major_strides(&[4, 5], 6), vec![30, 6]);
        assert_eq!(row_major_strides(&[7], 1), vec![1]);
    }

    #[test]
    fn two_core_aligned_plan() {
        // var [4, 8] f32, indices [2, 1]; each row is one 8-element block
        let planner = ScatterNdAddPlanner::new(&soc(2), DType::Float32);
        let plan = planner.plan(&[4, 8], &[2, 1]).unwrap();
        assert_eq!(plan.mode, TilingMode::AlignedResident);
        assert_eq!(plan.update_width, 8);
        assert_eq!(plan.index_step, 16);
        assert_eq!(plan.core_count, 2);
        assert_eq!(plan.strides(), &[8]);
        assert_eq!(plan.indices_last_count, 2);
        assert_eq!(plan.indices_front_dim, 2);
    }

    #[test]
    fn mode_selection() {
        let planner = ScatterNdAddPlanner::new(&soc(4), DType::Float32);
        let cap = planner.budget().adds_elems;
        assert_eq!(planner.plan(&[4, 3], &[2, 1]).unwrap().mode, TilingMode::SmallResident);
        assert_eq!(planner.plan(&[4, 11], &[2, 1]).unwrap().mode, TilingMode::UnalignedStreamed);
        assert_eq!(planner.plan(&[4, 3], &[cap, 1]).unwrap().mode, TilingMode::SmallStreamed);
        assert_eq!(planner.plan(&[4, 8], &[cap, 1]).unwrap().mode, TilingMode::AlignedStreamed);
    }

    #[test]
    fn small_modes_are_single_core() {
        let planner = ScatterNdAddPlanner::new(&soc(8), DType::Float32);
        let plan = planner.plan(&[16, 3], &[4, 1]).unwrap();
        assert_eq!(plan.core_count, 1);
        assert_eq!(plan.index_step, 48);
    }

    #[test]
    fn rows_spread_over_cores() {
        let planner = ScatterNdAddPlanner::new(&soc(4), DType::Float16);
        // 10 rows over 4 cores: 3 rows each, 4 cores used
        let plan = planner.plan(&[10, 16], &[1, 1]).unwrap();
        assert_eq!(plan.index_step, 48);
        assert_eq!(plan.core_count, 4);
        // 3 rows over 4 cores: one row each, 3 cores used
        let plan = planner.plan(&[3, 16], &[1, 1]).unwrap();
        assert_eq!(plan.core_count, 3);
    }

    #[test]
    fn full_rank_indices_address_single_elements() {
        let planner = ScatterNdAddPlanner::new(&soc(2), DType::Int32);
        let plan = planner.plan(&[4, 5], &[3, 2]).unwrap();
        assert_eq!(plan.update_width, 1);
        assert_eq!(plan.strides(), &[5, 1]);
        assert_eq!(plan.mode, TilingMode::SmallResident);
    }

    #[test]
    fn rejects_bad_shapes() {
        let planner = ScatterNdAddPlanner::new(&soc(2), DType::Float32);
        assert!(planner.plan(&[4, 8], &[]).is_err());
        assert!(planner.plan(&[4, 8], &[2, 3]).is_err());
        assert!(planner.plan(&[4, 0], &[2, 1]).is_err());
    }

    #[test]
    fn index_chunks_cover_all_tuples() {
        let planner = ScatterNdAddPlanner::new(&soc(2), DType::Float32);
        let chunk = planner.budget().index_chunk_elems(2);
        let plan = planner.plan(&[64, 64, 8], &[chunk, 2]).unwrap();
        assert_eq!(plan.indices_len(chunk), Some(chunk * 2));
        assert_eq!(plan.indices_loop_count, 2);
        assert_eq!(plan.indices_last_count, 0);
    }
}
