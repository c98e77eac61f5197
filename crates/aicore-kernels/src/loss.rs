//! Binary cross-entropy loss kernel.
//!
//! `loss = -w * (y * ln(max(x, eps)) + (1 - y) * ln(max(1 - max(x, eps), eps)))`
//! followed by an optional `mean` or `sum` over every element.
//!
//! float16 inputs are computed in float32 on platforms whose vector unit
//! multiplies float32, and in float16 otherwise; results are cast back to
//! the input dtype.

use std::fmt;
use std::str::FromStr;

use aicore_common::{
    AicoreError, CompileInfo, DType, KernelArtifact, KernelError, KernelKind, ParamError, Result,
    SocVersion, TensorDesc, check_same_dtype,
};
use half::f16;
use serde::{Deserialize, Serialize};

use crate::context::KernelContext;
use crate::element::Element;

pub const KERNEL_NAME: &str = "binary_cross_entropy";

/// Element types of `x`, `y` and `weight`.
pub const LOSS_DTYPES: &[DType] = &[DType::Float16, DType::Float32];

/// Floor applied before every logarithm.
const EPS: f32 = 1e-12;

/// Channel block of the 5-D/6-D fractal layouts.
const C0: i64 = 16;

// ── Helpers ────────────────────────────────────────────────────────

fn invalid_args(reason: &str) -> AicoreError {
    AicoreError::Kernel(KernelError::InvalidArguments {
        reason: format!("{KERNEL_NAME}: {reason}"),
    })
}

fn validate_len<T>(name: &str, values: &[T], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(invalid_args(&format!(
            "length mismatch ({name} has {}, x has {expected})",
            values.len()
        )));
    }
    Ok(())
}

// ── Types ──────────────────────────────────────────────────────────

/// How per-element losses are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossReduction {
    /// Keep the per-element tensor.
    None,
    /// Scale every element by `1/N`, then sum.
    Mean,
    /// Sum every element.
    Sum,
}

impl LossReduction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mean => "mean",
            Self::Sum => "sum",
        }
    }
}

impl fmt::Display for LossReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossReduction {
    type Err = ParamError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            other => Err(ParamError::InvalidAttr {
                kernel: KERNEL_NAME.to_string(),
                attr: "reduction".to_string(),
                value: other.to_string(),
                rule: "reduction type should in mean/sum/none".to_string(),
            }),
        }
    }
}

/// Element types the loss kernel runs on.
pub trait LossElement: Element {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl LossElement for f32 {
    fn to_f32(self) -> f32 {
        self
    }
    fn from_f32(v: f32) -> Self {
        v
    }
}

impl LossElement for f16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }
}

/// Result of one launch.
#[derive(Debug, Clone, PartialEq)]
pub enum LossOutput<T> {
    Scalar(T),
    Elementwise(Vec<T>),
}

impl<T: Copy> LossOutput<T> {
    pub fn scalar(&self) -> Option<T> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Elementwise(_) => None,
        }
    }
}

/// Arithmetic precision of the vector pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    F16,
    F32,
}

impl Precision {
    /// Round `v` to this precision.
    #[inline]
    fn r(self, v: f32) -> f32 {
        match self {
            Self::F32 => v,
            Self::F16 => f16::from_f32(v).to_f32(),
        }
    }
}

// ── Kernel ─────────────────────────────────────────────────────────

/// Build a `binary_cross_entropy` kernel and register it under `kernel_name`.
///
/// # Errors
///
/// Returns a [`ParamError`] when `reduction` is not `mean`, `sum` or `none`,
/// when a dtype is outside [`LOSS_DTYPES`], or when `y`, `weight` or
/// `output` differ in dtype from `x`.
pub fn binary_cross_entropy(
    x: &TensorDesc,
    y: &TensorDesc,
    weight: Option<&TensorDesc>,
    output: &TensorDesc,
    reduction: &str,
    kernel_name: &str,
    ctx: &mut KernelContext,
) -> Result<BinaryCrossEntropyKernel> {
    let reduction: LossReduction = reduction.parse()?;
    let dtype = x.check_dtype(KERNEL_NAME, "x", LOSS_DTYPES)?;
    let y_dtype = y.check_dtype(KERNEL_NAME, "y", LOSS_DTYPES)?;
    check_same_dtype(KERNEL_NAME, "y", y_dtype, "x", dtype)?;
    if let Some(weight) = weight {
        let w_dtype = weight.check_dtype(KERNEL_NAME, "weight", LOSS_DTYPES)?;
        check_same_dtype(KERNEL_NAME, "weight", w_dtype, "x", dtype)?;
    }
    let out_dtype = output.check_dtype(KERNEL_NAME, "output", LOSS_DTYPES)?;
    check_same_dtype(KERNEL_NAME, "output", out_dtype, "x", dtype)?;

    let soc_version = ctx.soc().soc_version;
    let compute_dtype = if dtype == DType::Float16 && soc_version.supports_fp32_vector_mul() {
        DType::Float32
    } else {
        dtype
    };

    let mut compile_info = CompileInfo::new();
    compile_info
        .insert("dtype", dtype.as_str())
        .insert("compute_dtype", compute_dtype.as_str())
        .insert("reduction", reduction.as_str())
        .insert("weighted", weight.is_some());
    if reduction == LossReduction::Mean {
        compile_info.insert("reduce_mean_cof_dtype", compute_dtype.as_str());
    }
    ctx.registry_mut().register(KernelArtifact {
        name: kernel_name.to_string(),
        kind: KernelKind::BinaryCrossEntropy,
        dtype,
        compile_info,
    });
    log::debug!("built {kernel_name}: {dtype} computed in {compute_dtype}, reduction {reduction}");

    Ok(BinaryCrossEntropyKernel {
        name: kernel_name.to_string(),
        dtype,
        compute_dtype,
        reduction,
        weighted: weight.is_some(),
    })
}

/// A built `binary_cross_entropy` kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCrossEntropyKernel {
    name: String,
    dtype: DType,
    compute_dtype: DType,
    reduction: LossReduction,
    weighted: bool,
}

impl BinaryCrossEntropyKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Precision the arithmetic runs in.
    pub fn compute_dtype(&self) -> DType {
        self.compute_dtype
    }

    pub fn reduction(&self) -> LossReduction {
        self.reduction
    }

    /// Compute the loss of predictions `x` against targets `y`.
    ///
    /// `weight` must be given exactly when the kernel was built with one.
    pub fn run<T: LossElement>(
        &self,
        x: &[T],
        y: &[T],
        weight: Option<&[T]>,
    ) -> Result<LossOutput<T>> {
        if T::DTYPE != self.dtype {
            return Err(KernelError::DtypeMismatch {
                kernel: self.name.clone(),
                expected: self.dtype,
                actual: T::DTYPE,
            }
            .into());
        }
        if x.is_empty() {
            return Err(invalid_args("inputs must not be empty"));
        }
        validate_len("y", y, x.len())?;
        match (weight, self.weighted) {
            (Some(w), true) => validate_len("weight", w, x.len())?,
            (None, false) => {}
            (Some(_), false) => return Err(invalid_args("kernel was built without weight")),
            (None, true) => return Err(invalid_args("kernel was built with weight")),
        }

        let p = if self.compute_dtype == DType::Float16 { Precision::F16 } else { Precision::F32 };
        let losses = x.iter().zip(y).enumerate().map(|(i, (&xi, &yi))| {
            let w = weight.map(|w| w[i].to_f32());
            element_loss(p, xi.to_f32(), yi.to_f32(), w)
        });

        Ok(match self.reduction {
            LossReduction::None => LossOutput::Elementwise(losses.map(T::from_f32).collect()),
            LossReduction::Sum => {
                LossOutput::Scalar(T::from_f32(losses.fold(0.0, |acc, l| p.r(acc + l))))
            }
            LossReduction::Mean => {
                let cof = p.r(1.0 / x.len() as f32);
                LossOutput::Scalar(T::from_f32(losses.fold(0.0, |acc, l| p.r(acc + p.r(l * cof)))))
            }
        })
    }
}

/// Loss of one element, every intermediate rounded to `p`.
fn element_loss(p: Precision, x: f32, y: f32, w: Option<f32>) -> f32 {
    let (x, y) = (p.r(x), p.r(y));
    // the floor is itself an f16 constant in f16 compute, where it flushes to zero
    let eps = p.r(EPS);
    let x = x.max(eps);
    let mul1 = p.r(p.r(x.ln()) * y);
    let one_minus_x = p.r(1.0 - x).max(eps);
    let one_minus_y = p.r(1.0 - y);
    let mul2 = p.r(p.r(one_minus_x.ln()) * one_minus_y);
    let loss = -p.r(mul1 + mul2);
    match w {
        Some(w) => p.r(loss * p.r(w)),
        None => loss,
    }
}

// ── Format selection ───────────────────────────────────────────────

/// Data layouts the loss kernel can be offered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    #[serde(rename = "ND")]
    Nd,
    #[serde(rename = "NC1HWC0")]
    Nc1hwc0,
    #[serde(rename = "NDC1HWC0")]
    Ndc1hwc0,
    #[serde(rename = "FRACTAL_Z")]
    FractalZ,
    #[serde(rename = "FRACTAL_Z_3D")]
    FractalZ3d,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nd => "ND",
            Self::Nc1hwc0 => "NC1HWC0",
            Self::Ndc1hwc0 => "NDC1HWC0",
            Self::FractalZ => "FRACTAL_Z",
            Self::FractalZ3d => "FRACTAL_Z_3D",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(dtype, format)` pairs offered for `x`, `y`, `weight` and `output` alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSelection {
    pub entries: Vec<(DType, Format)>,
}

impl FormatSelection {
    /// Comma-separated dtype column.
    pub fn dtypes(&self) -> String {
        self.entries.iter().map(|(d, _)| d.as_str()).collect::<Vec<_>>().join(",")
    }

    /// Comma-separated format column.
    pub fn formats(&self) -> String {
        self.entries.iter().map(|(_, f)| f.as_str()).collect::<Vec<_>>().join(",")
    }
}

/// Layouts the kernel can run in for predictions described by `x`.
///
/// ND is always offered. With a channel dimension divisible by 16 the
/// 5-D (or 6-D for 3-D data) fractal layouts are added: FRACTAL_Z when the
/// batch dimension is divisible by 16 as well, NC1HWC0 otherwise.
/// `none` reduction is elementwise and offers every layout.
pub fn select_format(x: &TensorDesc, reduction: LossReduction, soc: SocVersion) -> FormatSelection {
    let ori_shape = x.ori_shape.as_deref().unwrap_or(&x.shape);
    let ori_format = x.ori_format.as_deref().unwrap_or("ND");

    let (mut hd, mut fz) = (false, false);
    if is_supported_ori_format(ori_format) || ori_shape.len() == ori_format.len() {
        let dim = |axis: char| ori_format.find(axis).and_then(|i| ori_shape.get(i)).copied();
        if let (Some(c), Some(n)) = (dim('C'), dim('N')) {
            if c % C0 == 0 && n % C0 == 0 {
                fz = true;
            } else if c % C0 == 0 {
                hd = true;
            }
        }
    }
    if reduction == LossReduction::None {
        hd = true;
        fz = true;
    }

    let dtypes = soc.loss_dtypes();
    let is_3d = ori_shape.len() == 5;
    let mut entries: Vec<(DType, Format)> = dtypes.iter().map(|&d| (d, Format::Nd)).collect();
    if hd {
        let format = if is_3d { Format::Ndc1hwc0 } else { Format::Nc1hwc0 };
        entries.extend(dtypes.iter().map(|&d| (d, format)));
    }
    if fz {
        let format = if is_3d { Format::FractalZ3d } else { Format::FractalZ };
        entries.extend(dtypes.iter().map(|&d| (d, format)));
    }
    FormatSelection { entries }
}

/// Any ordering of `NDHWC` or `NHWC`.
fn is_supported_ori_format(format: &str) -> bool {
    let mut letters: Vec<char> = format.chars().collect();
    letters.sort_unstable();
    letters == ['C', 'D', 'H', 'N', 'W'] || letters == ['C', 'H', 'N', 'W']
}
