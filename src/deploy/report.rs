// ABOUTME: Status report of one service compared with its declaration.
// ABOUTME: Lists replica counts and per-container image, health and start time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::runtime::{ContainerInfo, ReplicaOps};
use crate::service::ServiceDeclaration;

use super::error::DeployError;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub service: String,
    pub replicas_active: usize,
    pub replicas_desired: u32,
    pub update_strategy: String,
    pub declared_image: String,
    pub priority: i64,
    pub containers: Vec<ContainerReport>,
}

impl ServiceReport {
    /// Containers running an image other than the declared one.
    pub fn drifted(&self) -> impl Iterator<Item = &ContainerReport> {
        self.containers.iter().filter(|c| c.image_drift)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub name: String,
    pub image: String,
    pub health: String,
    pub started_at: Option<DateTime<Utc>>,
    /// The container runs an image other than the declared one.
    pub image_drift: bool,
}

impl ContainerReport {
    fn new(service: &ServiceDeclaration, info: &ContainerInfo) -> Self {
        let image = info.image.clone().unwrap_or_default();
        Self {
            name: info.name.clone(),
            image_drift: image != service.image(),
            image,
            health: info.health_status().as_str().to_string(),
            started_at: info.started_at.as_deref().and_then(parse_timestamp),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Build a report for `service`. A service without containers reports zero
/// active replicas rather than failing.
pub async fn report<R>(runtime: &R, service: &ServiceDeclaration) -> Result<ServiceReport, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let names = match runtime.find_all_container_names(service.name()).await {
        Ok(names) => names,
        Err(e) if e.is_not_created() => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let containers = runtime
        .inspect_containers(&names)
        .await?
        .iter()
        .map(|info| ContainerReport::new(service, info))
        .collect();

    Ok(ServiceReport {
        service: service.name().to_string(),
        replicas_active: names.len(),
        replicas_desired: service.desired_replicas(),
        update_strategy: service.update_strategy(),
        declared_image: service.image(),
        priority: service.priority(),
        containers,
    })
}
