// ABOUTME: Service deployment orchestration, including rolling updates.
// ABOUTME: Exports the replica swap state machine, health waits and batch operations.

mod batch;
mod discovery;
mod error;
mod gateway;
mod health;
mod report;
mod rolling;
mod service;
mod state;
mod strategy;
mod swap;

pub use batch::{
    BatchReport, FailedService, pull_services, remove_service, remove_services, restart_services,
    start_services, stop_services, upgrade,
};
pub use discovery::with_discovery_paused;
pub use error::{DeployError, DeployErrorKind};
pub use gateway::reload_gateway;
pub use health::{
    DEFAULT_HEALTH_TIMEOUT, HealthOutcome, POLL_INTERVAL, wait_for_health, wait_for_log_message,
    wait_for_service,
};
pub use report::{ContainerReport, ServiceReport, report};
pub use rolling::{Replacement, RolloutReport, deploy_rolling};
pub use service::{
    DeployOptions, ServiceDeployment, collect_images, deploy_compose_like, deploy_recreate,
    deploy_service, remove_images,
};
pub use state::{Healthy, Pending, Retired, RollbackAllowed, ScaledUp};
pub use strategy::{DeployStrategy, UpdateStrategy};
pub use swap::{ReplicaSwap, SwapResult};
