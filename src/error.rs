// ABOUTME: Application-wide error types for harbor.
// ABOUTME: Wraps layer errors so commands can report one-line failures.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeployError;
use crate::hooks::HookError;
use crate::runtime::DriverError;
use crate::selector::ProfileError;
use crate::service::LookupError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("COMPOSE_PROJECT_NAME is not set, define it in .env, the environment or harbor.yml")]
    MissingProjectName,

    #[error("compose file not found: {0}")]
    ComposeFileNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid compose configuration: {0}")]
    InvalidComposeConfig(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("{failed} of {total} service(s) failed")]
    ServicesFailed { failed: usize, total: usize },

    #[error("command exited with code {0}")]
    CommandExit(i32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
