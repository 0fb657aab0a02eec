// ABOUTME: Driver error types with SNAFU pattern.
// ABOUTME: Covers compose invocations, engine API calls and replica bookkeeping.

use snafu::Snafu;

use crate::types::InstanceNum;

/// Error raised by the container driver facade.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DriverError {
    #[snafu(display("failed to spawn {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "{command} exited with {}: {}",
        code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
        output.trim()
    ))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[snafu(display("container engine connection failed: {message}"))]
    Connection { message: String },

    #[snafu(display("container engine error during {operation}: {message}"))]
    Engine { operation: String, message: String },

    #[snafu(display("container \"{name}\" not found"))]
    ContainerNotFound { name: String },

    #[snafu(display(
        "service \"{service}\" (instance={}) was not yet created by the container engine, please start it first",
        instance.map(|n| n.to_string()).unwrap_or_else(|| "last".to_string())
    ))]
    ServiceNotCreated {
        service: String,
        instance: Option<InstanceNum>,
    },

    #[snafu(display("no replica of \"{service}\" is left to retire"))]
    NoReplicaToRetire { service: String },

    #[snafu(display("--no-recreate and --force-recreate cannot be used together"))]
    ConflictingRecreateFlags,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Compose binary could not be started or returned a failure.
    Compose,
    /// Engine API unreachable or returned an error.
    Engine,
    /// The requested container or service does not exist.
    Missing,
    /// The request itself was invalid.
    Usage,
}

impl DriverError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DriverErrorKind {
        match self {
            DriverError::Spawn { .. } | DriverError::CommandFailed { .. } => {
                DriverErrorKind::Compose
            }
            DriverError::Connection { .. } | DriverError::Engine { .. } => DriverErrorKind::Engine,
            DriverError::ContainerNotFound { .. }
            | DriverError::ServiceNotCreated { .. }
            | DriverError::NoReplicaToRetire { .. } => DriverErrorKind::Missing,
            DriverError::ConflictingRecreateFlags => DriverErrorKind::Usage,
        }
    }

    /// True when the engine has no container for the requested service.
    pub fn is_not_created(&self) -> bool {
        matches!(self, DriverError::ServiceNotCreated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_created_message_names_service_and_instance() {
        let err = DriverError::ServiceNotCreated {
            service: "website".to_string(),
            instance: Some(2),
        };
        assert_eq!(
            err.to_string(),
            "service \"website\" (instance=2) was not yet created by the container engine, please start it first"
        );
        assert_eq!(err.kind(), DriverErrorKind::Missing);
        assert!(err.is_not_created());
    }

    #[test]
    fn command_failure_reports_exit_code() {
        let err = DriverError::CommandFailed {
            command: "docker-compose up".to_string(),
            code: Some(1),
            output: "boom\n".to_string(),
        };
        assert_eq!(err.to_string(), "docker-compose up exited with 1: boom");
        assert_eq!(err.kind(), DriverErrorKind::Compose);
    }
}
