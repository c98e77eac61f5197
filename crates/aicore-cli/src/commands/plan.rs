//! Reference tiling plan command

use aicore_common::{DType, SocConfig};
use aicore_kernels::ScatterNdAddPlanner;
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use crate::output::print_json;

/// Build a scatter_nd_add tiling blob for static shapes
#[derive(Debug, Parser)]
pub struct PlanCommand {
    /// Shape of `var`, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub var_shape: Vec<usize>,

    /// Shape of `indices`, comma separated; the last dim is the tuple length
    #[arg(long, value_delimiter = ',', required = true)]
    pub indices_shape: Vec<usize>,

    /// Element type of `var`
    #[arg(long, default_value = "float32")]
    pub dtype: String,
}

impl PlanCommand {
    pub fn run(&self, soc: &SocConfig) -> Result<()> {
        let dtype: DType = self.dtype.parse().map_err(anyhow::Error::msg)?;
        let planner = ScatterNdAddPlanner::new(soc, dtype);
        let plan = planner
            .plan(&self.var_shape, &self.indices_shape)
            .context("failed to plan scatter_nd_add")?;
        info!("planned {} over {} units", plan.mode, plan.core_count);
        print_json(&json!({
            "blob": plan.encode().to_vec(),
            "plan": plan,
        }))
    }
}
