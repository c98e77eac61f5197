//! Run scatter_nd_add on a JSON job

use std::path::PathBuf;

use aicore_common::{SocConfig, TensorDesc};
use aicore_kernels::{KernelContext, scatter_nd_add};
use anyhow::{Context, Result, ensure};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::output::print_json;

/// A float32 `var[indices] += adds` job.
///
/// `tiling` overrides the reference planner's blob.
#[derive(Debug, Clone, Deserialize)]
pub struct ScatterJob {
    pub var_shape: Vec<usize>,
    pub indices_shape: Vec<usize>,
    pub var: Vec<f32>,
    pub indices: Vec<i32>,
    pub adds: Vec<f32>,
    #[serde(default)]
    pub tiling: Option<Vec<i64>>,
}

impl ScatterJob {
    fn check(&self) -> Result<()> {
        let var_len: usize = self.var_shape.iter().product();
        ensure!(
            self.var.len() == var_len,
            "var holds {} values, shape {:?} needs {var_len}",
            self.var.len(),
            self.var_shape
        );
        let indices_len: usize = self.indices_shape.iter().product();
        ensure!(
            self.indices.len() == indices_len,
            "indices hold {} values, shape {:?} needs {indices_len}",
            self.indices.len(),
            self.indices_shape
        );
        Ok(())
    }
}

/// Run scatter_nd_add on float32 data read from a JSON job file
#[derive(Debug, Parser)]
pub struct ScatterCommand {
    /// Path to the job file
    #[arg(long, value_name = "PATH")]
    pub job: PathBuf,
}

impl ScatterCommand {
    pub fn run(&self, soc: &SocConfig) -> Result<()> {
        let text = std::fs::read_to_string(&self.job)
            .with_context(|| format!("failed to read job {}", self.job.display()))?;
        let mut job: ScatterJob = serde_json::from_str(&text).context("failed to parse job")?;
        job.check()?;

        let mut ctx = KernelContext::new(soc.clone())?;
        let var = desc(&job.var_shape, "float32");
        let kernel = scatter_nd_add(
            &var,
            &desc(&job.indices_shape, "int32"),
            &TensorDesc::new(vec![job.adds.len() as i64], "float32"),
            &var,
            false,
            "scatter_nd_add",
            &mut ctx,
        )?;

        let tiling = match job.tiling.take() {
            Some(blob) => blob,
            None => kernel.planner().plan(&job.var_shape, &job.indices_shape)?.encode().to_vec(),
        };
        let report = kernel
            .launch(&tiling, &mut job.var, &job.indices, &job.adds)
            .context("scatter_nd_add launch failed")?;
        info!("{} on {} active units", report.mode, report.active_units());

        print_json(&json!({
            "output": job.var,
            "report": report,
        }))
    }
}

fn desc(shape: &[usize], dtype: &str) -> TensorDesc {
    TensorDesc::new(shape.iter().map(|&d| d as i64).collect::<Vec<_>>(), dtype)
}
