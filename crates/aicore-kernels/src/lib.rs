//! Vector-unit kernels for the aicore accelerator family
//!
//! Each kernel has a builder that validates operand descriptors against the
//! target platform and registers compile info in a [`KernelContext`], and a
//! launch (or run) method that executes the kernel on host buffers:
//!
//! - [`scatter_nd_add`]: `var[indices] += adds`, split across execution units
//!   by a 24-slot tiling plan.
//! - [`broadcast_to`]: NumPy-style broadcast to a target shape.
//! - [`loss`]: binary cross-entropy with `none` / `mean` / `sum` reduction.
//!
//! The execution-unit model lives in [`cores`] (worker pool), [`staging`]
//! (unified-buffer budget and block transfers) and [`vector`] (masked,
//! repeat-batched vector adds).

pub mod broadcast_to;
pub mod context;
pub mod cores;
pub mod element;
pub mod loss;
pub mod scatter_nd_add;
pub mod staging;
pub mod vector;

pub use broadcast_to::{BroadcastToKernel, broadcast_to};
pub use context::KernelContext;
pub use cores::{CorePool, CorePoolConfig, CorePoolMetrics};
pub use element::{Element, ScatterElement};
pub use loss::{
    BinaryCrossEntropyKernel, Format, FormatSelection, LossElement, LossOutput, LossReduction,
    binary_cross_entropy, select_format,
};
pub use scatter_nd_add::{
    LaunchReport, ScatterNdAddKernel, ScatterNdAddPlanner, TilingMode, TilingPlan, scatter_nd_add,
};
pub use staging::{StagingBudget, TransferStats};
pub use vector::VectorStats;
