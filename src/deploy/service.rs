// ABOUTME: Deploys a single service with the selected update strategy.
// ABOUTME: Runs service hooks around the rollout and cleans up previous images.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::context::HarborContext;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{Driver, ReplicaOps, ServiceOps, UpOptions};
use crate::service::ServiceDeclaration;

use super::error::DeployError;
use super::health::DEFAULT_HEALTH_TIMEOUT;
use super::rolling::{RolloutReport, deploy_rolling};
use super::strategy::{DeployStrategy, UpdateStrategy};

/// Options for bringing one service up.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub strategy: UpdateStrategy,
    /// Keep existing containers untouched (compose strategy only).
    pub no_recreate: bool,
    /// Extra arguments passed to `up`.
    pub extra_args: Vec<String>,
    /// Remove the images the previous containers ran on.
    pub remove_previous_images: bool,
    pub health_timeout: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            strategy: UpdateStrategy::Auto,
            no_recreate: false,
            extra_args: Vec::new(),
            remove_previous_images: false,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }
}

/// What a service deployment did.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDeployment {
    pub service: String,
    pub strategy: DeployStrategy,
    /// Present for rolling updates.
    pub rollout: Option<RolloutReport>,
    pub removed_images: Vec<String>,
}

/// Bring `service` to its declared state.
///
/// The strategy is resolved before anything runs, so an unknown strategy
/// label leaves the engine untouched. The rollout is wrapped in the
/// `service-start-{name}` hooks.
pub async fn deploy_service<R: Driver>(
    ctx: &HarborContext<R>,
    service: &ServiceDeclaration,
    opts: &DeployOptions,
    diagnostics: &mut Diagnostics,
) -> Result<ServiceDeployment, DeployError> {
    let (strategy, reason) = DeployStrategy::for_service(opts.strategy, service)?;
    match reason {
        Some(reason) => info!(service = service.name(), strategy = %strategy, reason, "deploying"),
        None => info!(service = service.name(), strategy = %strategy, "deploying"),
    }

    let runtime = ctx.runtime();
    let action = format!("service-start-{}", service.name());

    ctx.hooks()
        .around(&action, Some(service.name()), async {
            let previous_images = if opts.remove_previous_images {
                collect_images(runtime, service).await?
            } else {
                Vec::new()
            };

            let rollout = match strategy {
                DeployStrategy::Rolling => {
                    Some(deploy_rolling(runtime, service, opts.health_timeout).await?)
                }
                DeployStrategy::Compose => {
                    deploy_compose_like(runtime, service, opts).await?;
                    None
                }
                DeployStrategy::Recreate => {
                    deploy_recreate(runtime, service, opts).await?;
                    None
                }
            };

            if let Some(report) = &rollout {
                let unverified = report.unverified();
                if unverified > 0 {
                    diagnostics.warn(Warning::health_unverified(format!(
                        "{unverified} replica(s) of \"{}\" have no health check, readiness was assumed",
                        service.name()
                    )));
                }
            }

            let removed_images = remove_images(runtime, &previous_images, diagnostics).await;

            Ok::<_, DeployError>(ServiceDeployment {
                service: service.name().to_string(),
                strategy,
                rollout,
                removed_images,
            })
        })
        .await
}

/// Plain `up`: compose decides what needs to be recreated.
pub async fn deploy_compose_like<R>(
    runtime: &R,
    service: &ServiceDeclaration,
    opts: &DeployOptions,
) -> Result<(), DeployError>
where
    R: ServiceOps + ?Sized,
{
    info!(service = service.name(), "performing compose deployment");
    let up = UpOptions {
        no_recreate: opts.no_recreate,
        force_recreate: false,
        extra_args: opts.extra_args.clone(),
    };
    runtime.up(service, &up).await?;
    Ok(())
}

/// Replace every container at once, accepting downtime.
pub async fn deploy_recreate<R>(
    runtime: &R,
    service: &ServiceDeclaration,
    opts: &DeployOptions,
) -> Result<(), DeployError>
where
    R: ServiceOps + ?Sized,
{
    info!(service = service.name(), "performing recreate deployment");
    let up = UpOptions {
        no_recreate: false,
        force_recreate: true,
        extra_args: opts.extra_args.clone(),
    };
    runtime.up(service, &up).await?;
    Ok(())
}

/// Images used by the current containers of a service.
///
/// A service that was never started has no images to collect.
pub async fn collect_images<R>(runtime: &R, service: &ServiceDeclaration) -> Result<Vec<String>, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let names = match runtime.find_all_container_names(service.name()).await {
        Ok(names) => names,
        Err(e) if e.is_not_created() => {
            debug!(service = service.name(), "no containers yet, nothing to clean up later");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut images = BTreeSet::new();
    for info in runtime.inspect_containers(&names).await? {
        if let Some(image) = info.image {
            images.insert(image);
        }
    }

    Ok(images.into_iter().collect())
}

/// Remove images, turning failures into warnings.
///
/// Images still used by a running container cannot be removed, which is
/// expected when the service did not change its image.
pub async fn remove_images<R>(runtime: &R, images: &[String], diagnostics: &mut Diagnostics) -> Vec<String>
where
    R: ServiceOps + ?Sized,
{
    let mut removed = Vec::new();

    for image in images {
        info!(image = %image, "removing previous image");
        match runtime.remove_image(image).await {
            Ok(()) => removed.push(image.clone()),
            Err(e) => diagnostics.warn(Warning::image_cleanup(format!(
                "cannot clean up image \"{image}\", it may still be in use: {e}"
            ))),
        }
    }

    removed
}
