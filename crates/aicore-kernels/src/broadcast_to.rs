//! `broadcast_to`: replicate a tensor along size-1 and missing leading
//! dimensions to reach a target shape.
//!
//! The target shape arrives as a 1-D integer operand. Its length is the
//! target rank; `-1` in the operand's own shape means "same rank as `x`".
//! Dimensions are matched right-aligned, NumPy style.

use aicore_common::{
    CompileInfo, DType, KernelArtifact, KernelError, KernelKind, ParamError, Result, TensorDesc,
    check_same_dtype,
};

use crate::context::KernelContext;
use crate::element::Element;

pub const KERNEL_NAME: &str = "broadcast_to";

/// Element types of `x` and `y`.
pub const X_DTYPES: &[DType] =
    &[DType::Float16, DType::Float32, DType::Int8, DType::Uint8, DType::Int32];

/// Element types of the `shape` operand.
pub const SHAPE_DTYPES: &[DType] = &[DType::Int32, DType::Int64];

fn shape_error(rule: String) -> ParamError {
    ParamError::InvalidShape { kernel: KERNEL_NAME.to_string(), param: "shape".to_string(), rule }
}

fn invalid_args(reason: String) -> KernelError {
    KernelError::InvalidArguments { reason: format!("{KERNEL_NAME}: {reason}") }
}

/// Build a `broadcast_to` kernel and register it under `kernel_name`.
///
/// # Errors
///
/// Returns a [`ParamError`] when a dtype is outside its allow-list, `y`
/// differs from `x`, the `shape` operand has rank above 1, its length is
/// below `-1`, or the target rank is smaller than the rank of `x`.
pub fn broadcast_to(
    x: &TensorDesc,
    shape: &TensorDesc,
    y: &TensorDesc,
    kernel_name: &str,
    ctx: &mut KernelContext,
) -> Result<BroadcastToKernel> {
    let dtype = x.check_dtype(KERNEL_NAME, "x", X_DTYPES)?;
    let shape_dtype = shape.check_dtype(KERNEL_NAME, "shape", SHAPE_DTYPES)?;
    let y_dtype = y.check_dtype(KERNEL_NAME, "y", X_DTYPES)?;
    check_same_dtype(KERNEL_NAME, "y", y_dtype, "x", dtype)?;

    if shape.rank() > 1 {
        return Err(shape_error(format!("shape should be 1D, got rank {}", shape.rank())).into());
    }
    // A 0-d shape operand carries a single dimension.
    let dims_value = shape.shape.first().copied().unwrap_or(1);
    if dims_value < -1 {
        return Err(shape_error(format!("shape[0] should be more than -1, got {dims_value}")).into());
    }
    let target_rank = if dims_value == -1 { x.rank() } else { dims_value as usize };
    if target_rank < x.rank() {
        return Err(shape_error(format!(
            "target rank {target_rank} is smaller than input rank {}",
            x.rank()
        ))
        .into());
    }

    let mut compile_info = CompileInfo::new();
    compile_info
        .insert("dtype", dtype.as_str())
        .insert("shape_dtype", shape_dtype.as_str())
        .insert("target_rank", target_rank);
    ctx.registry_mut().register(KernelArtifact {
        name: kernel_name.to_string(),
        kind: KernelKind::BroadcastTo,
        dtype,
        compile_info,
    });
    log::debug!("built {kernel_name}: {dtype} to rank {target_rank}");

    Ok(BroadcastToKernel { name: kernel_name.to_string(), dtype, target_rank })
}

/// A built `broadcast_to` kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastToKernel {
    name: String,
    dtype: DType,
    target_rank: usize,
}

impl BroadcastToKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn target_rank(&self) -> usize {
        self.target_rank
    }

    /// Resolve the output shape of broadcasting `x_shape` to `target`.
    pub fn output_shape(&self, x_shape: &[usize], target: &[i64]) -> Result<Vec<usize>> {
        if target.len() != self.target_rank {
            return Err(invalid_args(format!(
                "target has {} dims, kernel was built for rank {}",
                target.len(),
                self.target_rank
            ))
            .into());
        }
        if x_shape.len() > target.len() {
            return Err(invalid_args(format!(
                "cannot broadcast rank {} to rank {}",
                x_shape.len(),
                target.len()
            ))
            .into());
        }
        let offset = target.len() - x_shape.len();
        target
            .iter()
            .enumerate()
            .map(|(i, &dim)| -> Result<usize> {
                let out = usize::try_from(dim)
                    .map_err(|_| invalid_args(format!("target dim {i} is negative ({dim})")))?;
                let input = if i < offset { 1 } else { x_shape[i - offset] };
                if input == out || input == 1 {
                    Ok(out)
                } else {
                    Err(invalid_args(format!(
                        "input dim {input} cannot broadcast to {out} at axis {i}"
                    ))
                    .into())
                }
            })
            .collect()
    }

    /// Broadcast `x` (row-major, shape `x_shape`) to `target`.
    pub fn run<T: Element>(&self, x: &[T], x_shape: &[usize], target: &[i64]) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(KernelError::DtypeMismatch {
                kernel: self.name.clone(),
                expected: self.dtype,
                actual: T::DTYPE,
            }
            .into());
        }
        let numel: usize = x_shape.iter().product();
        if x.len() != numel {
            return Err(invalid_args(format!(
                "x holds {} elements, shape {x_shape:?} needs {numel}",
                x.len()
            ))
            .into());
        }
        let out_shape = self.output_shape(x_shape, target)?;
        let out_numel: usize = out_shape.iter().product();

        // Input stride per output axis; zero on broadcast axes.
        let offset = out_shape.len() - x_shape.len();
        let mut in_strides = vec![0usize; out_shape.len()];
        let mut acc = 1usize;
        for (axis, &dim) in x_shape.iter().enumerate().rev() {
            if dim != 1 {
                in_strides[axis + offset] = acc;
            }
            acc *= dim;
        }

        let mut out = Vec::with_capacity(out_numel);
        let mut coord = vec![0usize; out_shape.len()];
        let mut src = 0usize;
        for _ in 0..out_numel {
            out.push(x[src]);
            // odometer increment, last axis fastest
            for axis in (0..out_shape.len()).rev() {
                coord[axis] += 1;
                src += in_strides[axis];
                if coord[axis] < out_shape[axis] {
                    break;
                }
                src -= in_strides[axis] * coord[axis];
                coord[axis] = 0;
            }
        }
        Ok(out)
    }
}
