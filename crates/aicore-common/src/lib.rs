//! Common types for the aicore kernel stack
//!
//! This crate provides the foundational types used by the kernels and the
//! CLI: error taxonomy, element dtypes, operand descriptors, the target
//! platform configuration and the registry of built kernels.

pub mod dtype;
pub mod error;
pub mod kernel_registry;
pub mod soc_config;
pub mod tensor;

pub use dtype::DType;
pub use error::*;
pub use kernel_registry::{CompileInfo, KernelArtifact, KernelKind, KernelRegistry};
pub use soc_config::{MAX_BLOCK_BYTES, RESERVED_UB_SIZE, SocConfig, SocConfigError, SocVersion};
pub use tensor::{TensorDesc, check_same_dtype};
