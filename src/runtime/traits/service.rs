// ABOUTME: Service-level operations trait backed by compose verbs.
// ABOUTME: Up, stop, restart, remove, pull, images, logs and interactive exec.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::shared_types::{LogLine, LogOptions, UpOptions};
use crate::runtime::error::DriverError;
use crate::service::ServiceDeclaration;
use crate::types::ContainerName;

/// Stream of container output.
pub type LogLines = Pin<Box<dyn Stream<Item = Result<LogLine, DriverError>> + Send>>;

/// Whole-service operations.
#[async_trait]
pub trait ServiceOps: Send + Sync {
    /// Rendered compose configuration of the whole project as YAML.
    async fn compose_config(&self) -> Result<String, DriverError>;

    /// Create or update a service at its declared replica count.
    async fn up(&self, service: &ServiceDeclaration, opts: &UpOptions) -> Result<(), DriverError>;

    async fn stop(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError>;

    async fn restart(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError>;

    /// Stop and remove all containers of a service.
    async fn rm(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError>;

    async fn pull(&self, services: &[String]) -> Result<(), DriverError>;

    async fn remove_image(&self, image: &str) -> Result<(), DriverError>;

    async fn container_logs(
        &self,
        name: &ContainerName,
        opts: &LogOptions,
    ) -> Result<LogLines, DriverError>;

    /// Run a command in a replica with the terminal attached.
    ///
    /// Returns the command's exit code.
    async fn exec_passthrough(
        &self,
        name: &ContainerName,
        command: &[String],
        tty: bool,
    ) -> Result<i32, DriverError>;
}
