//! `scatter_nd_add`: `var[indices] += adds` across parallel execution units.
//!
//! # Pipeline
//!
//! 1. [`scatter_nd_add`] validates operand dtypes, registers the kernel and
//!    publishes compile info (staging budget, core count, element sizes).
//! 2. A host-side planner (see [`ScatterNdAddPlanner`]) turns shapes into a
//!    [`TilingPlan`] and encodes it into a 24-slot blob.
//! 3. [`ScatterNdAddKernel::launch`] runs one unit per physical core. Each
//!    unit decodes the blob, walks the indices chunk by chunk and accumulates
//!    only the targets its [`RangeGate`] owns.
//!
//! # Partitioning
//!
//! Unit `u` owns flat output offsets `[u * step, (u + 1) * step)`. The output
//! buffer is split into those windows before the units start, so every unit
//! holds an exclusive `&mut` slice and no two units can write the same
//! element. A plan whose step does not cover a whole update row loses the
//! part of the row past the window end; debug builds (or
//! `debug_partition_checks`) panic on such a plan instead.

mod dispatch;
mod engine;
mod gate;
mod planner;
mod resolver;
mod tiling;

pub use dispatch::{UnitReport, UnitState};
pub use engine::{ChunkDelta, IndexChunk};
pub use gate::RangeGate;
pub use planner::{ScatterNdAddPlanner, row_major_strides};
pub use resolver::IndexResolver;
pub use tiling::{MAX_INDEX_RANK, TILING_ARG_NUM, TilingMode, TilingPlan};

use std::sync::Arc;

use aicore_common::{
    CompileInfo, DType, KernelArtifact, KernelError, KernelKind, Result, SocConfig, TensorDesc,
    check_same_dtype,
};
use serde::Serialize;
use serde_json::json;

use crate::context::KernelContext;
use crate::cores::CorePool;
use crate::element::ScatterElement;
use crate::staging::StagingBudget;
use dispatch::{LaunchInputs, run_unit};

pub const KERNEL_NAME: &str = "scatter_nd_add";

/// Element types of `var`, `adds` and `var_out`.
pub const VAR_DTYPES: &[DType] =
    &[DType::Float32, DType::Float16, DType::Int8, DType::Uint8, DType::Int32];

/// Element types of `indices`.
pub const INDICES_DTYPES: &[DType] = &[DType::Int32];

/// Build a `scatter_nd_add` kernel and register it under `kernel_name`.
///
/// `use_locking` is accepted for interface compatibility and ignored.
///
/// # Errors
///
/// Returns a [`ParamError`](aicore_common::ParamError) when `indices` is not
/// `int32`, `var` is not one of [`VAR_DTYPES`], or `adds` / `var_out` differ
/// from `var`.
pub fn scatter_nd_add(
    var: &TensorDesc,
    indices: &TensorDesc,
    adds: &TensorDesc,
    var_out: &TensorDesc,
    use_locking: bool,
    kernel_name: &str,
    ctx: &mut KernelContext,
) -> Result<ScatterNdAddKernel> {
    indices.check_dtype(KERNEL_NAME, "indices", INDICES_DTYPES)?;
    let dtype = var.check_dtype(KERNEL_NAME, "var", VAR_DTYPES)?;
    let adds_dtype = adds.check_dtype(KERNEL_NAME, "adds", VAR_DTYPES)?;
    check_same_dtype(KERNEL_NAME, "adds", adds_dtype, "var", dtype)?;
    let out_dtype = var_out.check_dtype(KERNEL_NAME, "var_out", VAR_DTYPES)?;
    check_same_dtype(KERNEL_NAME, "var_out", out_dtype, "var", dtype)?;
    if use_locking {
        log::debug!("{kernel_name}: use_locking has no effect");
    }

    let soc = ctx.soc().clone();
    let budget = StagingBudget::new(&soc, dtype);
    let compile_info = compile_info(&soc, dtype);
    let pool = ctx.pool()?;
    let replaced = ctx.registry_mut().register(KernelArtifact {
        name: kernel_name.to_string(),
        kind: KernelKind::ScatterNdAdd,
        dtype,
        compile_info: compile_info.clone(),
    });
    if replaced.is_some() {
        log::debug!("{kernel_name}: replaced previously registered kernel");
    }
    log::debug!("built {kernel_name} for {dtype}: {}", compile_info.to_json());

    Ok(ScatterNdAddKernel { name: kernel_name.to_string(), dtype, soc, budget, compile_info, pool })
}

/// `{"vars": {ub_size, core_num, var_size, indices_size}}`.
fn compile_info(soc: &SocConfig, dtype: DType) -> CompileInfo {
    let mut info = CompileInfo::new();
    info.insert(
        "vars",
        json!({
            "ub_size": StagingBudget::compile_info_ub_size(soc),
            "core_num": soc.core_num,
            "var_size": dtype.size_in_bytes(),
            "indices_size": DType::Int32.size_in_bytes(),
        }),
    );
    info
}

/// A built `scatter_nd_add` kernel.
#[derive(Debug, Clone)]
pub struct ScatterNdAddKernel {
    name: String,
    dtype: DType,
    soc: SocConfig,
    budget: StagingBudget,
    compile_info: CompileInfo,
    pool: Arc<CorePool>,
}

/// Outcome of one launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchReport {
    pub kernel: String,
    pub mode: TilingMode,
    /// One entry per physical unit, in unit order.
    pub units: Vec<UnitReport>,
}

impl LaunchReport {
    pub fn active_units(&self) -> usize {
        self.units.iter().filter(|u| u.active).count()
    }

    /// Sum of the per-unit chunk deltas.
    pub fn totals(&self) -> ChunkDelta {
        self.units.iter().fold(ChunkDelta::default(), |mut acc, u| {
            acc.merge(&u.delta);
            acc
        })
    }
}

impl ScatterNdAddKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn budget(&self) -> &StagingBudget {
        &self.budget
    }

    pub fn compile_info(&self) -> &CompileInfo {
        &self.compile_info
    }

    /// Reference planner matching this kernel's platform and dtype.
    pub fn planner(&self) -> ScatterNdAddPlanner {
        ScatterNdAddPlanner::new(&self.soc, self.dtype)
    }

    /// Run the kernel: `var[indices] += adds`, in place.
    ///
    /// `tiling` is the blob every unit decodes. The plan's mode and counts
    /// must agree with this kernel's staging budget.
    ///
    /// # Errors
    ///
    /// - [`KernelError::DtypeMismatch`] when `T` is not the built dtype.
    /// - [`KernelError::InvalidTiling`] when the blob is malformed or does not
    ///   fit this kernel's staging budget.
    /// - [`KernelError::InvalidArguments`] when `indices` or `adds` are
    ///   shorter than the plan reads.
    pub fn launch<T: ScatterElement>(
        &self,
        tiling: &[i64],
        var: &mut [T],
        indices: &[i32],
        adds: &[T],
    ) -> Result<LaunchReport> {
        if T::DTYPE != self.dtype {
            return Err(KernelError::DtypeMismatch {
                kernel: self.name.clone(),
                expected: self.dtype,
                actual: T::DTYPE,
            }
            .into());
        }
        let plan = TilingPlan::decode(tiling)?;
        self.check_plan(&plan, indices.len(), adds.len())?;

        let units = self.soc.core_num;
        if plan.core_count > units {
            log::warn!(
                "{}: plan asks for {} cores but the platform has {units}; offsets past unit {} are not processed",
                self.name,
                plan.core_count,
                units - 1
            );
        }

        let mut windows: Vec<&mut [T]> = var.chunks_mut(plan.index_step).take(units).collect();
        windows.resize_with(units, Default::default);

        let inputs = LaunchInputs {
            tiling,
            indices,
            adds,
            budget: &self.budget,
            check_partition: cfg!(debug_assertions) || self.soc.debug_partition_checks,
        };
        let reports = self.pool.run_units(windows, |unit, window| run_unit(unit, window, &inputs));
        let units = reports.into_iter().collect::<std::result::Result<Vec<_>, _>>()?;

        let report = LaunchReport { kernel: self.name.clone(), mode: plan.mode, units };
        let totals = report.totals();
        log::debug!(
            "{}: {} on {} units, {} of {} tuples accumulated",
            self.name,
            plan.mode,
            report.active_units(),
            totals.tuples_owned,
            plan.indices_front_dim
        );
        Ok(report)
    }

    /// Reject plans this kernel's staging cannot execute as described.
    fn check_plan(&self, plan: &TilingPlan, indices_len: usize, adds_len: usize) -> Result<()> {
        let budget = &self.budget;
        let block = budget.block_elems;
        let w = plan.update_width;
        let tiling = |reason: String| -> aicore_common::AicoreError {
            KernelError::InvalidTiling { reason }.into()
        };

        let shape_ok = match plan.mode {
            TilingMode::AlignedResident | TilingMode::AlignedStreamed => w % block == 0,
            TilingMode::SmallResident | TilingMode::SmallStreamed => w < block,
            TilingMode::UnalignedStreamed => w % block != 0 && w >= block,
        };
        if !shape_ok {
            return Err(tiling(format!(
                "mode {} cannot carry rows of {w} elements with {block}-element blocks",
                plan.mode
            )));
        }
        let rows_len = plan.indices_front_dim.checked_mul(w);
        if rows_len.map_or(true, |n| plan.adds_num < n) {
            return Err(tiling(format!(
                "adds num {} is short of {} rows of {w} elements",
                plan.adds_num, plan.indices_front_dim
            )));
        }
        if plan.mode.is_resident() && plan.adds_num > budget.adds_elems {
            return Err(tiling(format!(
                "mode {} stages {} update elements but staging holds {}",
                plan.mode, plan.adds_num, budget.adds_elems
            )));
        }
        let covered = plan
            .updates_loop_count
            .checked_mul(budget.adds_elems)
            .and_then(|n| n.checked_add(plan.updates_last_count));
        if covered != Some(w) {
            return Err(tiling(format!(
                "update pieces ({} x {} + {}) do not cover a row of {w}",
                plan.updates_loop_count, budget.adds_elems, plan.updates_last_count
            )));
        }
        let chunk = budget.index_chunk_elems(plan.indices_last_dim);
        if plan.indices_last_count > chunk {
            return Err(tiling(format!(
                "last index chunk of {} exceeds the {chunk}-element chunk size",
                plan.indices_last_count
            )));
        }

        let needed = plan.indices_len(chunk).ok_or_else(|| {
            tiling(format!(
                "index chunks ({} x {chunk} + {}) overflow",
                plan.indices_loop_count, plan.indices_last_count
            ))
        })?;
        if indices_len < needed {
            return Err(KernelError::InvalidArguments {
                reason: format!("indices hold {indices_len} values, plan reads {needed}"),
            }
            .into());
        }
        if adds_len < plan.adds_num {
            return Err(KernelError::InvalidArguments {
                reason: format!("adds hold {adds_len} values, plan reads {}", plan.adds_num),
            }
            .into());
        }
        Ok(())
    }
}
