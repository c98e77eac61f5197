//! Element data types understood by the kernels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tensor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float16,
    Float32,
    Int8,
    Uint8,
    Int32,
    Int64,
}

impl DType {
    /// Every known dtype.
    pub const ALL: &'static [DType] =
        &[DType::Float16, DType::Float32, DType::Int8, DType::Uint8, DType::Int32, DType::Int64];

    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Float16 => 2,
            Self::Float32 | Self::Int32 => 4,
            Self::Int64 => 8,
        }
    }

    /// Single-byte integer types that the vector unit cannot add directly.
    pub const fn is_narrow_int(self) -> bool {
        matches!(self, Self::Int8 | Self::Uint8)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DType {
    type Err = String;

    /// Case-insensitive; accepts the framework aliases `float` and `half`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float16" | "half" | "fp16" => Ok(Self::Float16),
            "float32" | "float" | "fp32" => Ok(Self::Float32),
            "int8" => Ok(Self::Int8),
            "uint8" => Ok(Self::Uint8),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            other => Err(format!("unknown dtype: {other}")),
        }
    }
}
