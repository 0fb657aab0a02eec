// ABOUTME: Replica swap state types for the type state pattern.
// ABOUTME: Each state carries the data that is known once it is reached.

use crate::runtime::ReplicaSet;
use crate::types::{ContainerName, InstanceNum};

use super::health::HealthOutcome;

/// Nothing has been touched yet.
/// Available actions: `scale_up()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// One replica above the declared count is running.
/// Available actions: `await_health()`, `roll_back()`
#[derive(Debug, Clone)]
pub struct ScaledUp {
    replicas: ReplicaSet,
    candidate: ContainerName,
}

impl ScaledUp {
    pub(crate) fn new(replicas: ReplicaSet, candidate: ContainerName) -> Self {
        Self {
            replicas,
            candidate,
        }
    }

    /// Replica set as reported right after scaling.
    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    /// The newest replica, the one that has to become healthy.
    pub fn candidate(&self) -> &ContainerName {
        &self.candidate
    }
}

/// The new replica passed its health check.
/// Available actions: `retire_oldest()`, `roll_back()`
#[derive(Debug, Clone)]
pub struct Healthy {
    replicas: ReplicaSet,
    candidate: ContainerName,
    outcome: HealthOutcome,
}

impl Healthy {
    pub(crate) fn new(scaled: ScaledUp, outcome: HealthOutcome) -> Self {
        Self {
            replicas: scaled.replicas,
            candidate: scaled.candidate,
            outcome,
        }
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub fn candidate(&self) -> &ContainerName {
        &self.candidate
    }

    pub fn outcome(&self) -> HealthOutcome {
        self.outcome
    }
}

/// An old replica was removed in favour of the new one.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy)]
pub struct Retired {
    retired: InstanceNum,
    replacement: InstanceNum,
    outcome: HealthOutcome,
}

impl Retired {
    pub(crate) fn new(retired: InstanceNum, replacement: InstanceNum, outcome: HealthOutcome) -> Self {
        Self {
            retired,
            replacement,
            outcome,
        }
    }

    pub fn retired(&self) -> InstanceNum {
        self.retired
    }

    pub fn replacement(&self) -> InstanceNum {
        self.replacement
    }

    pub fn outcome(&self) -> HealthOutcome {
        self.outcome
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Pending {}
    impl Sealed for super::ScaledUp {}
    impl Sealed for super::Healthy {}
}

/// States from which the service can be returned to its declared count.
pub trait RollbackAllowed: sealed::Sealed {}

impl RollbackAllowed for Pending {}
impl RollbackAllowed for ScaledUp {}
impl RollbackAllowed for Healthy {}
