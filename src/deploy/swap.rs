// ABOUTME: One replica swap of a rolling update, as a chain of state transitions.
// ABOUTME: Scale up, wait for health, retire the oldest replica, or roll back.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::runtime::ReplicaOps;
use crate::service::ServiceDeclaration;
use crate::types::InstanceNum;

use super::error::DeployError;
use super::health::wait_for_health;
use super::state::{Healthy, Pending, Retired, RollbackAllowed, ScaledUp};

/// A swap in progress, parameterized by its current state.
#[derive(Debug)]
pub struct ReplicaSwap<'a, S> {
    service: &'a ServiceDeclaration,
    state: S,
}

/// Result type for transitions that may need rollback on failure.
///
/// On failure the swap is handed back in the state it was in, so the caller
/// can decide whether to roll back.
pub type SwapResult<'a, T, S> = Result<ReplicaSwap<'a, T>, (ReplicaSwap<'a, S>, DeployError)>;

impl<'a> ReplicaSwap<'a, Pending> {
    pub fn new(service: &'a ServiceDeclaration) -> Self {
        Self {
            service,
            state: Pending,
        }
    }

    /// Bring up one extra replica and pick the newest one as the candidate.
    pub async fn scale_up<R>(self, runtime: &R) -> SwapResult<'a, ScaledUp, Pending>
    where
        R: ReplicaOps + ?Sized,
    {
        let replicas = match runtime.scale_up(self.service).await {
            Ok(replicas) => replicas,
            Err(e) => return Err((self, e.into())),
        };

        let Some(newest) = replicas.newest() else {
            let err = crate::runtime::DriverError::ServiceNotCreated {
                service: self.service.name().to_string(),
                instance: None,
            };
            return Err((self, err.into()));
        };

        let candidate = runtime.container_name(self.service.name(), newest);
        Ok(self.transition(ScaledUp::new(replicas, candidate)))
    }
}

impl<'a> ReplicaSwap<'a, ScaledUp> {
    pub async fn await_health<R>(self, runtime: &R, timeout: Duration) -> SwapResult<'a, Healthy, ScaledUp>
    where
        R: ReplicaOps + ?Sized,
    {
        match wait_for_health(runtime, self.state.candidate(), timeout).await {
            Ok(outcome) => {
                let state = Healthy::new(self.state.clone(), outcome);
                Ok(self.transition(state))
            }
            Err(e) => Err((self, e)),
        }
    }
}

impl<'a> ReplicaSwap<'a, Healthy> {
    /// Remove the oldest replica not retired earlier in this rollout.
    pub async fn retire_oldest<R>(
        self,
        runtime: &R,
        retired: &BTreeSet<InstanceNum>,
    ) -> SwapResult<'a, Retired, Healthy>
    where
        R: ReplicaOps + ?Sized,
    {
        match runtime
            .kill_replica(self.service, self.state.replicas(), retired)
            .await
        {
            Ok(instance) => {
                let replacement = self.state.candidate().instance();
                let outcome = self.state.outcome();
                Ok(self.transition(Retired::new(instance, replacement, outcome)))
            }
            Err(e) => Err((self, e.into())),
        }
    }
}

impl<'a> ReplicaSwap<'a, Retired> {
    pub fn finish(self) -> Retired {
        info!(
            service = self.service.name(),
            retired = self.state.retired(),
            replacement = self.state.replacement(),
            "replica replaced"
        );
        self.state
    }
}

impl<'a, S: RollbackAllowed> ReplicaSwap<'a, S> {
    /// Return the service to its declared replica count.
    pub async fn roll_back<R>(self, runtime: &R) -> Result<(), DeployError>
    where
        R: ReplicaOps + ?Sized,
    {
        warn!(service = self.service.name(), "rolling back to declared replica count");
        runtime.scale_to_desired_state(self.service).await?;
        Ok(())
    }
}

impl<'a, S> ReplicaSwap<'a, S> {
    fn transition<T>(self, state: T) -> ReplicaSwap<'a, T> {
        ReplicaSwap {
            service: self.service,
            state,
        }
    }

    pub fn service(&self) -> &ServiceDeclaration {
        self.service
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}
