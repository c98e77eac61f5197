//! Error types shared by every aicore crate.
//!
//! Two families matter to callers:
//!
//! - [`ParamError`]: kernel-build validation failures (dtype allow-lists,
//!   ranks, attribute values). Each one names the kernel, the offending
//!   parameter and the rule it broke.
//! - [`KernelError`]: launch-time faults such as a malformed tiling blob or
//!   buffers whose lengths disagree with the plan.
//!
//! Partition overlaps between execution units are deliberately *not* part of
//! this taxonomy; they are a contract on the tiling planner.

use crate::DType;
use thiserror::Error;

/// Top-level error for the aicore workspace.
#[derive(Debug, Error)]
pub enum AicoreError {
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Launch-time kernel failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error("invalid tiling data: {reason}")]
    InvalidTiling { reason: String },

    #[error("kernel '{kernel}' was built for {expected} but launched with {actual}")]
    DtypeMismatch { kernel: String, expected: DType, actual: DType },

    #[error("execution failed: {reason}")]
    ExecutionFailed { reason: String },
}

/// Kernel-build parameter validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("{kernel}: dtype of '{param}' is {dtype}, expected one of [{}]", join_dtypes(.allowed))]
    DtypeNotSupported { kernel: String, param: String, dtype: String, allowed: Vec<DType> },

    #[error("{kernel}: dtype of '{param}' ({actual}) must equal dtype of '{other}' ({expected})")]
    DtypeMismatch {
        kernel: String,
        param: String,
        other: String,
        actual: DType,
        expected: DType,
    },

    #[error("{kernel}: invalid shape for '{param}': {rule}")]
    InvalidShape { kernel: String, param: String, rule: String },

    #[error("{kernel}: invalid value '{value}' for attribute '{attr}': {rule}")]
    InvalidAttr { kernel: String, attr: String, value: String, rule: String },
}

impl ParamError {
    /// Name of the kernel that rejected the parameter.
    pub fn kernel(&self) -> &str {
        match self {
            Self::DtypeNotSupported { kernel, .. }
            | Self::DtypeMismatch { kernel, .. }
            | Self::InvalidShape { kernel, .. }
            | Self::InvalidAttr { kernel, .. } => kernel,
        }
    }

    /// Name of the offending parameter or attribute.
    pub fn field(&self) -> &str {
        match self {
            Self::DtypeNotSupported { param, .. }
            | Self::DtypeMismatch { param, .. }
            | Self::InvalidShape { param, .. } => param,
            Self::InvalidAttr { attr, .. } => attr,
        }
    }
}

fn join_dtypes(dtypes: &[DType]) -> String {
    dtypes.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, AicoreError>;
