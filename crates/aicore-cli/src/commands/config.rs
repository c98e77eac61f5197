//! `config` subcommands

use aicore_common::SocConfig;
use anyhow::{Context, Result};
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the resolved configuration (file, then environment overrides)
    Show,
    /// Print the default configuration
    Default,
}

impl ConfigAction {
    pub fn run(&self, soc: &SocConfig) -> Result<()> {
        let text = match self {
            Self::Show => soc.to_toml(),
            Self::Default => SocConfig::default_toml(),
        }
        .context("failed to render configuration")?;
        print!("{text}");
        Ok(())
    }
}
