// ABOUTME: Command module aggregator for the harbor CLI.
// ABOUTME: Shared helpers for building the context and reporting warnings.

mod gateway;
mod service;
mod services;

pub use gateway::reload_gateway;
pub use service::service;
pub use services::{list, pull, remove, restart, start, stop, upgrade};

use crate::cli::RolloutArgs;
use harbor::config::Config;
use harbor::context::HarborContext;
use harbor::deploy::DeployOptions;
use harbor::diagnostics::Diagnostics;
use harbor::error::Result;
use harbor::output::Output;
use harbor::runtime::ComposeDriver;
use std::path::Path;
use std::time::Duration;

/// Load the project configuration and attach to the local engine.
fn connect(dir: &Path) -> Result<HarborContext<ComposeDriver>> {
    let config = Config::discover(dir)?;
    let driver = ComposeDriver::connect(&config)?;
    Ok(HarborContext::new(config, driver))
}

fn deploy_options(args: &RolloutArgs, config: &Config) -> DeployOptions {
    DeployOptions {
        strategy: args.strategy,
        remove_previous_images: args.remove_previous_images,
        health_timeout: args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(config.health_timeout),
        ..DeployOptions::default()
    }
}

/// Emit collected warnings.
fn emit_warnings(diag: &Diagnostics, output: &Output) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
