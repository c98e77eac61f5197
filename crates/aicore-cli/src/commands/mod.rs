//! CLI command implementations

pub mod config;
pub mod info;
pub mod plan;
pub mod scatter;

pub use config::ConfigAction;
pub use info::InfoCommand;
pub use plan::PlanCommand;
pub use scatter::{ScatterCommand, ScatterJob};
