// ABOUTME: Gateway command implementation.
// ABOUTME: Validates and reloads the reverse proxy configuration.

use super::connect;
use harbor::deploy;
use harbor::error::Result;
use harbor::output::Output;
use std::path::Path;

pub async fn reload_gateway(dir: &Path, output: Output) -> Result<()> {
    let ctx = connect(dir)?;

    output.progress("Validating and reloading gateway configuration");
    let container = deploy::reload_gateway(ctx.runtime(), &ctx.config().gateway_service).await?;

    output.success(&format!("Gateway {container} reloaded"));
    Ok(())
}
