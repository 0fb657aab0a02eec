// ABOUTME: Waits for a replica to become healthy or for a log message to appear.
// ABOUTME: Polls the engine once per second and runs starting health checks by hand.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::runtime::{ContainerInfo, HealthState, LogOptions, ReplicaOps, ServiceOps};
use crate::types::{ContainerName, InstanceNum};

use super::error::DeployError;

/// Delay between two inspections of the same container.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time a replica gets to report healthy.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(120);

/// How a health wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    /// The container reported healthy, or its manual check passed.
    Healthy { elapsed: Duration },
    /// The container has no health check, readiness was assumed.
    Unverified,
}

impl HealthOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, HealthOutcome::Healthy { .. })
    }
}

/// Block until `container` is healthy or `timeout` has passed.
///
/// Containers without a health check are reported as [`HealthOutcome::Unverified`]
/// straight away. While the engine still reports `starting`, the declared
/// check is executed inside the container and a zero exit code counts as
/// healthy without waiting for the engine's next probe.
pub async fn wait_for_health<R>(
    runtime: &R,
    container: &ContainerName,
    timeout: Duration,
) -> Result<HealthOutcome, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let started = Instant::now();
    let mut info = runtime.inspect_container(container).await?;

    if !info.has_health_check() {
        warn!(
            container = %container,
            "container has no health check, cannot verify it is ready"
        );
        return Ok(HealthOutcome::Unverified);
    }

    info!(container = %container, timeout = ?timeout, "waiting for container to become healthy");

    loop {
        match info.health_status() {
            HealthState::Healthy => {
                return Ok(HealthOutcome::Healthy {
                    elapsed: started.elapsed(),
                });
            }
            HealthState::Starting => {
                if probe_manually(runtime, container, &info).await {
                    return Ok(HealthOutcome::Healthy {
                        elapsed: started.elapsed(),
                    });
                }
            }
            state => debug!(container = %container, state = state.as_str(), "not healthy yet"),
        }

        if started.elapsed() >= timeout {
            return Err(DeployError::ServiceNotReady {
                container: container.clone(),
                timeout,
            });
        }

        tokio::time::sleep(POLL_INTERVAL).await;
        info = runtime.inspect_container(container).await?;
    }
}

/// Wait for a replica of `service`, the newest one unless `instance` is given.
pub async fn wait_for_service<R>(
    runtime: &R,
    service: &str,
    instance: Option<InstanceNum>,
    timeout: Duration,
) -> Result<(ContainerName, HealthOutcome), DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let container = runtime.find_container_name(service, instance).await?;
    let outcome = wait_for_health(runtime, &container, timeout).await?;
    Ok((container, outcome))
}

/// Run the declared health check inside the container.
///
/// Any failure, including a failed exec, counts as "not healthy yet".
async fn probe_manually<R>(runtime: &R, container: &ContainerName, info: &ContainerInfo) -> bool
where
    R: ReplicaOps + ?Sized,
{
    let Some(command) = info.health_check_command() else {
        return false;
    };

    match runtime.exec_in_container(container, &command).await {
        Ok(result) if result.success() => {
            debug!(container = %container, "manual health check passed");
            true
        }
        Ok(result) => {
            debug!(
                container = %container,
                exit_code = ?result.exit_code,
                "manual health check failed"
            );
            false
        }
        Err(e) => {
            debug!(container = %container, error = %e, "manual health check could not run");
            false
        }
    }
}

/// Follow the container output until a line contains `text`.
pub async fn wait_for_log_message<R>(
    runtime: &R,
    container: &ContainerName,
    text: &str,
    timeout: Duration,
) -> Result<Duration, DeployError>
where
    R: ServiceOps + ?Sized,
{
    let started = Instant::now();
    let not_found = || DeployError::LogMessageNotFound {
        container: container.clone(),
        text: text.to_string(),
        timeout,
    };

    let search = async {
        let opts = LogOptions {
            follow: true,
            tail: None,
        };
        let mut lines = runtime.container_logs(container, &opts).await?;

        while let Some(line) = lines.next().await {
            if line?.content.contains(text) {
                return Ok(true);
            }
        }

        Ok::<bool, DeployError>(false)
    };

    match tokio::time::timeout(timeout, search).await {
        Ok(Ok(true)) => Ok(started.elapsed()),
        Ok(Ok(false)) | Err(_) => Err(not_found()),
        Ok(Err(e)) => Err(e),
    }
}
