// ABOUTME: Error types for rollouts and service operations.
// ABOUTME: Covers health timeouts, strategy validation and wrapped driver failures.

use std::time::Duration;

use crate::hooks::HookError;
use crate::runtime::{DriverError, DriverErrorKind};
use crate::service::LookupError;
use crate::types::ContainerName;

/// Errors raised while bringing a service to its declared state.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The engine rejected an operation.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A replica did not report healthy within the timeout.
    #[error("container {container} was not ready after {} seconds", timeout.as_secs())]
    ServiceNotReady {
        container: ContainerName,
        timeout: Duration,
    },

    /// A container never printed the expected text.
    #[error("container {container} did not log \"{text}\" within {} seconds", timeout.as_secs())]
    LogMessageNotFound {
        container: ContainerName,
        text: String,
        timeout: Duration,
    },

    /// Unknown update strategy name.
    #[error("invalid update strategy \"{0}\", expected one of: rolling, compose, recreate, auto")]
    InvalidStrategy(String),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Coarse classification used for exit messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// The engine or compose failed.
    Engine,
    /// A health or log wait ran out of time.
    Timeout,
    /// Input was rejected before anything ran.
    Validation,
    /// A user hook failed.
    Hook,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Driver(e) => match e.kind() {
                DriverErrorKind::Usage => DeployErrorKind::Validation,
                _ => DeployErrorKind::Engine,
            },
            DeployError::ServiceNotReady { .. } | DeployError::LogMessageNotFound { .. } => {
                DeployErrorKind::Timeout
            }
            DeployError::InvalidStrategy(_) | DeployError::Lookup(_) => DeployErrorKind::Validation,
            DeployError::Hook(_) => DeployErrorKind::Hook,
        }
    }

    /// Whether the failure came from a replica that never became ready.
    pub fn is_timeout(&self) -> bool {
        self.kind() == DeployErrorKind::Timeout
    }
}
