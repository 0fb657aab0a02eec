// ABOUTME: Replica operations trait used by rolling updates and health waits.
// ABOUTME: Scale, list, inspect, remove and exec into individual service replicas.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use super::shared_types::{ContainerInfo, ContainerSummary, ExecResult};
use crate::runtime::error::DriverError;
use crate::runtime::replica_set::ReplicaSet;
use crate::service::ServiceDeclaration;
use crate::types::{ContainerName, InstanceNum};

/// Replica-level operations on the engine.
///
/// Implementors provide the primitive calls; the bookkeeping used by
/// rolling updates (scale up by one, retire the oldest replica, return to
/// the declared count) is built on top of them.
#[async_trait]
pub trait ReplicaOps: Send + Sync {
    /// Compose project name, used as the container name prefix.
    fn project_name(&self) -> &str;

    /// Scale a service to exactly `replicas` containers.
    async fn scale(&self, service: &ServiceDeclaration, replicas: u32) -> Result<(), DriverError>;

    /// List containers that belong to the project.
    async fn list_project_containers(
        &self,
        only_running: bool,
    ) -> Result<Vec<ContainerSummary>, DriverError>;

    /// Inspect a container. Each call reflects the current engine state.
    async fn inspect_container(&self, name: &ContainerName) -> Result<ContainerInfo, DriverError>;

    /// Forcibly remove a container. Volumes are left in place.
    async fn remove_container(&self, name: &ContainerName) -> Result<(), DriverError>;

    /// Run a command inside a container and capture its output.
    async fn exec_in_container(
        &self,
        name: &ContainerName,
        command: &[String],
    ) -> Result<ExecResult, DriverError>;

    /// Stop the service discovery component so routing stays frozen.
    async fn pause_discovery(&self) -> Result<(), DriverError>;

    /// Bring the service discovery component back.
    async fn resume_discovery(&self) -> Result<(), DriverError>;

    fn container_name(&self, service: &str, instance: InstanceNum) -> ContainerName {
        ContainerName::new(self.project_name(), service, instance)
    }

    /// Project containers grouped by service name.
    async fn created_containers(
        &self,
        only_running: bool,
    ) -> Result<BTreeMap<String, ReplicaSet>, DriverError> {
        let mut services: BTreeMap<String, ReplicaSet> = BTreeMap::new();

        for container in self.list_project_containers(only_running).await? {
            services
                .entry(container.name.service().to_string())
                .or_default()
                .insert(container.name.instance(), container.running);
        }

        Ok(services)
    }

    /// Replicas of a single service, failing when it has none.
    async fn replicas_of(
        &self,
        service: &str,
        only_running: bool,
    ) -> Result<ReplicaSet, DriverError> {
        self.created_containers(only_running)
            .await?
            .remove(service)
            .filter(|replicas| !replicas.is_empty())
            .ok_or_else(|| DriverError::ServiceNotCreated {
                service: service.to_string(),
                instance: None,
            })
    }

    /// Bring up one replica above the declared count.
    ///
    /// The target is always `desired + 1`, so retrying after a failed
    /// attempt never grows the service further.
    async fn scale_up(&self, service: &ServiceDeclaration) -> Result<ReplicaSet, DriverError> {
        let target = service.desired_replicas() + 1;
        info!(service = service.name(), replicas = target, "scaling up");

        self.scale(service, target).await?;
        self.replicas_of(service.name(), false).await
    }

    /// Remove the oldest replica that was not retired yet.
    ///
    /// Returns the instance number that was removed.
    async fn kill_replica(
        &self,
        service: &ServiceDeclaration,
        replicas: &ReplicaSet,
        retired: &BTreeSet<InstanceNum>,
    ) -> Result<InstanceNum, DriverError> {
        let instance =
            replicas
                .next_to_retire(retired)
                .ok_or_else(|| DriverError::NoReplicaToRetire {
                    service: service.name().to_string(),
                })?;

        let name = self.container_name(service.name(), instance);
        info!(container = %name, "removing replica");
        self.remove_container(&name).await?;

        Ok(instance)
    }

    /// Inspect several containers, in the given order.
    async fn inspect_containers(
        &self,
        names: &[ContainerName],
    ) -> Result<Vec<ContainerInfo>, DriverError> {
        let mut inspected = Vec::with_capacity(names.len());
        for name in names {
            inspected.push(self.inspect_container(name).await?);
        }
        Ok(inspected)
    }

    /// Return a service to its declared replica count.
    async fn scale_to_desired_state(&self, service: &ServiceDeclaration) -> Result<(), DriverError> {
        let desired = service.desired_replicas();
        info!(service = service.name(), replicas = desired, "scaling to declared state");
        self.scale(service, desired).await
    }

    /// Container name of a given replica, or of the newest one when no
    /// instance is requested.
    async fn find_container_name(
        &self,
        service: &str,
        instance: Option<InstanceNum>,
    ) -> Result<ContainerName, DriverError> {
        let not_created = || DriverError::ServiceNotCreated {
            service: service.to_string(),
            instance,
        };

        let replicas = match self.replicas_of(service, false).await {
            Ok(replicas) => replicas,
            Err(e) if e.is_not_created() => return Err(not_created()),
            Err(e) => return Err(e),
        };

        let instance = match instance {
            Some(n) if replicas.contains(n) => n,
            Some(_) => return Err(not_created()),
            None => replicas.newest().ok_or_else(not_created)?,
        };

        Ok(self.container_name(service, instance))
    }

    /// Names of all containers of a service, oldest first.
    async fn find_all_container_names(
        &self,
        service: &str,
    ) -> Result<Vec<ContainerName>, DriverError> {
        let replicas = self.replicas_of(service, false).await?;
        Ok(replicas
            .instances()
            .map(|n| self.container_name(service, n))
            .collect())
    }
}
