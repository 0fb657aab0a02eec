// ABOUTME: Shared data types for driver traits.
// ABOUTME: Container inspection, health, exec results, log lines and up options.

use crate::runtime::error::DriverError;
use crate::types::ContainerName;

/// Health state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::None => "none",
        }
    }
}

/// Information about one container, refreshed on every inspection.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Engine-assigned container ID.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Image reference the container runs.
    pub image: Option<String>,
    /// Whether the container process is running.
    pub running: bool,
    /// Health status, `None` when the container declares no health check.
    pub health: Option<HealthState>,
    /// Health check test from the container config, e.g. `["CMD-SHELL", "curl -f localhost"]`.
    pub healthcheck_test: Option<Vec<String>>,
    /// Start timestamp as reported by the engine.
    pub started_at: Option<String>,
    /// Full inspection document for display.
    pub raw: serde_json::Value,
}

impl ContainerInfo {
    pub fn has_health_check(&self) -> bool {
        self.health.is_some()
    }

    /// Health status, falling back to the running state for containers
    /// without a health check.
    pub fn health_status(&self) -> HealthState {
        match self.health {
            Some(state) => state,
            None if self.running => HealthState::Healthy,
            None => HealthState::Unhealthy,
        }
    }

    /// Command that runs the declared health check by hand inside the container.
    ///
    /// `CMD-SHELL` tests go through `sh -c`, `CMD` tests run as given and
    /// `NONE` disables the check.
    pub fn health_check_command(&self) -> Option<Vec<String>> {
        let test = self.healthcheck_test.as_ref()?;
        let (kind, args) = test.split_first()?;

        match kind.as_str() {
            "CMD-SHELL" if !args.is_empty() => Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                args.join(" "),
            ]),
            "CMD" if !args.is_empty() => Some(args.to_vec()),
            _ => None,
        }
    }
}

/// Result of running a command inside a container.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// `None` when the engine never reported how the command ended.
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    /// Only a reported exit code of zero counts.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Options for `up`.
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Keep existing containers even when their configuration changed.
    pub no_recreate: bool,
    /// Recreate containers even when nothing changed.
    pub force_recreate: bool,
    /// Extra arguments passed through to compose.
    pub extra_args: Vec<String>,
}

impl UpOptions {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.no_recreate && self.force_recreate {
            return Err(DriverError::ConflictingRecreateFlags);
        }
        Ok(())
    }
}

/// Options for reading container logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Keep streaming new output.
    pub follow: bool,
    /// Number of lines to show from the end.
    pub tail: Option<u64>,
}

/// Which stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// A single chunk of container output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

/// Summary of a project container from an engine listing.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub name: ContainerName,
    pub running: bool,
}
