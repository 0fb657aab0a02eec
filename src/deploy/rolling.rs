// ABOUTME: Rolling update of one service, replacing replicas one at a time.
// ABOUTME: Each swap runs with discovery paused and rolls back on failure.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::runtime::ReplicaOps;
use crate::service::ServiceDeclaration;
use crate::types::InstanceNum;

use super::discovery::with_discovery_paused;
use super::error::DeployError;
use super::state::{Retired, RollbackAllowed};
use super::swap::ReplicaSwap;

/// One replica replaced during a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub retired: InstanceNum,
    pub replacement: InstanceNum,
    /// False when the new replica had no health check to confirm it.
    pub verified: bool,
}

impl From<Retired> for Replacement {
    fn from(state: Retired) -> Self {
        Self {
            retired: state.retired(),
            replacement: state.replacement(),
            verified: state.outcome().is_verified(),
        }
    }
}

/// Summary of a finished rolling update.
#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub service: String,
    pub replaced: Vec<Replacement>,
}

impl RolloutReport {
    pub fn unverified(&self) -> usize {
        self.replaced.iter().filter(|r| !r.verified).count()
    }
}

/// Replace every replica of `service`, oldest first.
///
/// Each iteration adds one replica, waits for it to become healthy and
/// removes the oldest remaining one, so the service never runs fewer than
/// its declared replicas. When an iteration fails the service is scaled
/// back to its declared count and the error is returned; replicas replaced
/// by earlier iterations stay in place.
pub async fn deploy_rolling<R>(
    runtime: &R,
    service: &ServiceDeclaration,
    health_timeout: Duration,
) -> Result<RolloutReport, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let desired = service.desired_replicas();
    let mut retired: BTreeSet<InstanceNum> = BTreeSet::new();
    let mut replaced = Vec::with_capacity(desired as usize);

    info!(service = service.name(), replicas = desired, "starting rolling update");

    for iteration in 1..=desired {
        let done = with_discovery_paused(runtime, swap_one(runtime, service, health_timeout, &retired))
            .await
            .inspect_err(|e| {
                error!(
                    service = service.name(),
                    iteration,
                    error = %e,
                    "rolling update failed"
                );
            })?;

        retired.insert(done.retired());
        replaced.push(Replacement::from(done));
    }

    info!(service = service.name(), replaced = replaced.len(), "rolling update finished");

    Ok(RolloutReport {
        service: service.name().to_string(),
        replaced,
    })
}

async fn swap_one<R>(
    runtime: &R,
    service: &ServiceDeclaration,
    health_timeout: Duration,
    retired: &BTreeSet<InstanceNum>,
) -> Result<Retired, DeployError>
where
    R: ReplicaOps + ?Sized,
{
    let swap = ReplicaSwap::new(service);

    let swap = match swap.scale_up(runtime).await {
        Ok(swap) => swap,
        Err((swap, e)) => return Err(roll_back(runtime, swap, e).await),
    };

    let swap = match swap.await_health(runtime, health_timeout).await {
        Ok(swap) => swap,
        Err((swap, e)) => return Err(roll_back(runtime, swap, e).await),
    };

    match swap.retire_oldest(runtime, retired).await {
        Ok(swap) => Ok(swap.finish()),
        Err((swap, e)) => Err(roll_back(runtime, swap, e).await),
    }
}

/// Roll back and hand back the error that caused it.
async fn roll_back<R, S>(runtime: &R, swap: ReplicaSwap<'_, S>, cause: DeployError) -> DeployError
where
    R: ReplicaOps + ?Sized,
    S: RollbackAllowed,
{
    if let Err(e) = swap.roll_back(runtime).await {
        error!(error = %e, "rollback failed");
    }
    cause
}
