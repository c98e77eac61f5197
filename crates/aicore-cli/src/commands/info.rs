//! Platform information command

use aicore_common::{DType, SocConfig};
use aicore_kernels::StagingBudget;
use aicore_kernels::scatter_nd_add::VAR_DTYPES;
use anyhow::Result;
use clap::Parser;
use serde_json::json;

use crate::output::print_json;

/// Show the target platform, its capabilities and staging budgets
#[derive(Debug, Parser)]
pub struct InfoCommand {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl InfoCommand {
    pub fn run(&self, soc: &SocConfig) -> Result<()> {
        let budgets: Vec<(DType, StagingBudget)> =
            VAR_DTYPES.iter().map(|&d| (d, StagingBudget::new(soc, d))).collect();

        if self.json {
            let budgets: serde_json::Map<String, serde_json::Value> = budgets
                .iter()
                .map(|(d, b)| (d.to_string(), json!(b)))
                .collect();
            return print_json(&json!({
                "version": env!("CARGO_PKG_VERSION"),
                "soc": soc,
                "usable_ub_bytes": soc.usable_ub_bytes(),
                "fp32_vector_mul": soc.soc_version.supports_fp32_vector_mul(),
                "loss_dtypes": soc.soc_version.loss_dtypes(),
                "staging": budgets,
            }));
        }

        println!("aicore {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Platform:");
        println!("  SoC:              {}", soc.soc_version);
        println!("  Execution units:  {}", soc.core_num);
        println!("  Unified buffer:   {} bytes ({} usable)", soc.ub_size, soc.usable_ub_bytes());
        println!("  Block:            {} bytes", soc.block_bytes);
        println!("  Partition checks: {}", soc.debug_partition_checks);
        println!();
        println!("Capabilities:");
        println!("  fp32 vector mul:  {}", soc.soc_version.supports_fp32_vector_mul());
        let loss: Vec<&str> = soc.soc_version.loss_dtypes().iter().map(|d| d.as_str()).collect();
        println!("  loss dtypes:      {}", loss.join(", "));
        println!();
        println!("Staging (elements):");
        for (dtype, b) in &budgets {
            println!(
                "  {:<8} adds {:>7}  indices {:>7}  block {:>3}",
                dtype.as_str(),
                b.adds_elems,
                b.indices_elems,
                b.block_elems
            );
        }
        Ok(())
    }
}
