// ABOUTME: Operations over a selection of services, run one service at a time.
// ABOUTME: Start, stop, restart, remove, pull and the full upgrade procedure.

use serde::Serialize;
use tracing::{error, info};

use crate::context::HarborContext;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{Driver, ServiceOps};
use crate::service::ServiceDeclaration;

use super::error::DeployError;
use super::gateway::reload_gateway;
use super::service::{DeployOptions, ServiceDeployment, collect_images, deploy_service, remove_images};

/// A service that failed while the rest of a batch went on.
#[derive(Debug, Clone, Serialize)]
pub struct FailedService {
    pub service: String,
    pub error: String,
}

/// Outcome of starting several services.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub started: Vec<ServiceDeployment>,
    pub failed: Vec<FailedService>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.started.len() + self.failed.len()
    }
}

/// Deploy services in the given order.
///
/// A failing service is recorded and the remaining services still start.
/// Hook failures abort the whole batch.
pub async fn start_services<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
    opts: &DeployOptions,
    diagnostics: &mut Diagnostics,
) -> Result<BatchReport, DeployError> {
    ctx.hooks()
        .around("start", None, async {
            let mut report = BatchReport::default();

            for service in services {
                info!(
                    service = service.name(),
                    replicas = service.desired_replicas(),
                    "starting service"
                );

                match deploy_service(ctx, service, opts, diagnostics).await {
                    Ok(deployment) => report.started.push(deployment),
                    Err(e) => {
                        error!(service = service.name(), error = %e, "cannot start service");
                        diagnostics.warn(Warning::service_failed(format!(
                            "cannot start service \"{}\": {e}",
                            service.name()
                        )));
                        report.failed.push(FailedService {
                            service: service.name().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            Ok::<_, DeployError>(report)
        })
        .await
}

pub async fn stop_services<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
) -> Result<(), DeployError> {
    for service in services {
        info!(service = service.name(), "stopping");
        ctx.runtime().stop(service.name(), &[]).await?;
    }
    Ok(())
}

pub async fn restart_services<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
) -> Result<(), DeployError> {
    for service in services {
        info!(service = service.name(), "restarting");
        ctx.runtime().restart(service.name(), &[]).await?;
    }
    Ok(())
}

/// Stop and remove the containers of one service, volumes are kept.
///
/// With `with_image` the images of the removed containers are deleted too,
/// best effort.
pub async fn remove_service<R: Driver>(
    ctx: &HarborContext<R>,
    service: &ServiceDeclaration,
    extra_args: &[String],
    with_image: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>, DeployError> {
    let runtime = ctx.runtime();
    let images = if with_image {
        collect_images(runtime, service).await?
    } else {
        Vec::new()
    };

    info!(service = service.name(), "removing");
    runtime.rm(service.name(), extra_args).await?;

    Ok(remove_images(runtime, &images, diagnostics).await)
}

pub async fn remove_services<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
    with_image: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>, DeployError> {
    let mut removed_images = Vec::new();
    for service in services {
        removed_images.extend(remove_service(ctx, service, &[], with_image, diagnostics).await?);
    }
    Ok(removed_images)
}

pub async fn pull_services<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
) -> Result<(), DeployError> {
    if services.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = services.iter().map(|s| s.name().to_string()).collect();
    info!(services = ?names, "pulling images");
    ctx.runtime().pull(&names).await?;
    Ok(())
}

/// Pull images, start every service and reload the gateway.
///
/// The gateway is reloaded only when every service started.
pub async fn upgrade<R: Driver>(
    ctx: &HarborContext<R>,
    services: &[ServiceDeclaration],
    opts: &DeployOptions,
    diagnostics: &mut Diagnostics,
) -> Result<BatchReport, DeployError> {
    ctx.hooks()
        .around("upgrade", None, async {
            pull_services(ctx, services).await?;
            let report = start_services(ctx, services, opts, diagnostics).await?;

            if report.is_success() {
                reload_gateway(ctx.runtime(), &ctx.config().gateway_service).await?;
            } else {
                info!(failed = report.failed.len(), "skipping gateway reload");
            }

            Ok::<_, DeployError>(report)
        })
        .await
}
