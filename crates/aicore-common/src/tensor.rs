//! Operand descriptors passed to kernel builders.
//!
//! A [`TensorDesc`] is the `{shape, dtype}` record a graph compiler hands to
//! a kernel entry point. The dtype stays a raw string so that an unknown type
//! surfaces as a [`ParamError`] naming the parameter, not as a parse failure.

use crate::{DType, ParamError};
use serde::{Deserialize, Serialize};

/// Shape and dtype of one kernel operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDesc {
    /// Dimensions; `-1` marks a dynamic dimension.
    pub shape: Vec<i64>,
    /// Element type name as supplied by the caller (case-insensitive).
    pub dtype: String,
    /// Shape before any layout transformation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ori_shape: Option<Vec<i64>>,
    /// Layout name of `ori_shape`, e.g. `"NCHW"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ori_format: Option<String>,
}

impl TensorDesc {
    pub fn new(shape: impl Into<Vec<i64>>, dtype: impl Into<String>) -> Self {
        Self { shape: shape.into(), dtype: dtype.into(), ori_shape: None, ori_format: None }
    }

    pub fn with_origin(mut self, ori_shape: impl Into<Vec<i64>>, ori_format: impl Into<String>) -> Self {
        self.ori_shape = Some(ori_shape.into());
        self.ori_format = Some(ori_format.into());
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Resolve the dtype and check it against `allowed`.
    pub fn check_dtype(
        &self,
        kernel: &str,
        param: &str,
        allowed: &[DType],
    ) -> Result<DType, ParamError> {
        let unsupported = || ParamError::DtypeNotSupported {
            kernel: kernel.to_string(),
            param: param.to_string(),
            dtype: self.dtype.to_ascii_lowercase(),
            allowed: allowed.to_vec(),
        };
        let dtype = self.dtype.parse::<DType>().map_err(|_| unsupported())?;
        if allowed.contains(&dtype) { Ok(dtype) } else { Err(unsupported()) }
    }
}

/// Require `actual` to equal `expected`, naming both parameters on failure.
pub fn check_same_dtype(
    kernel: &str,
    param: &str,
    actual: DType,
    other: &str,
    expected: DType,
) -> Result<(), ParamError> {
    if actual == expected {
        return Ok(());
    }
    Err(ParamError::DtypeMismatch {
        kernel: kernel.to_string(),
        param: param.to_string(),
        other: other.to_string(),
        actual,
        expected,
    })
}
