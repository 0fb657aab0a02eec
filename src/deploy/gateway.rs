// ABOUTME: Reloads the reverse proxy configuration inside the gateway container.
// ABOUTME: Validates the configuration before signalling nginx to reload.

use tracing::info;

use crate::runtime::{DriverError, ReplicaOps};
use crate::types::ContainerName;

use super::error::DeployError;

const VALIDATE_COMMAND: &[&str] = &["nginx", "-t"];
const RELOAD_COMMAND: &[&str] = &["nginx", "-s", "reload"];

/// Check and reload the nginx configuration of the newest gateway replica.
pub async fn reload_gateway<R>(runtime: &R, gateway_service: &str) -> Result<ContainerName, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let container = runtime.find_container_name(gateway_service, None).await?;

    info!(container = %container, "validating gateway configuration");
    run_checked(runtime, &container, VALIDATE_COMMAND).await?;

    info!(container = %container, "reloading gateway configuration");
    run_checked(runtime, &container, RELOAD_COMMAND).await?;

    Ok(container)
}

async fn run_checked<R>(runtime: &R, container: &ContainerName, command: &[&str]) -> Result<(), DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let argv: Vec<String> = command.iter().map(|s| s.to_string()).collect();
    let result = runtime.exec_in_container(container, &argv).await?;

    if !result.success() {
        return Err(DriverError::CommandFailed {
            command: format!("{} in {}", argv.join(" "), container),
            code: result.exit_code.and_then(|code| i32::try_from(code).ok()),
            output: format!("{}{}", result.stdout, result.stderr),
        }
        .into());
    }

    Ok(())
}
