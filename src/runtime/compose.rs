// ABOUTME: Container driver backed by the compose CLI and the Docker engine API.
// ABOUTME: Compose verbs go through the compose binary, container-level calls through bollard.

use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::StartExecOptions;
use bollard::models::{ContainerSummary as ContainerSummaryModel, ContainerSummaryStateEnum};
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RemoveImageOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use super::error::DriverError;
use super::process::{ComposeCommand, args};
use super::traits::{
    ContainerInfo, ContainerSummary, ExecResult, HealthState, LogLine, LogLines, LogOptions,
    LogStream, ReplicaOps, ServiceOps, UpOptions,
};
use crate::config::Config;
use crate::service::ServiceDeclaration;
use crate::types::{ContainerName, InstanceNum};

const PROJECT_LABEL: &str = "com.docker.compose.project";
const SERVICE_LABEL: &str = "com.docker.compose.service";
const NUMBER_LABEL: &str = "com.docker.compose.container-number";

const EXEC_SETTLE_ATTEMPTS: u32 = 20;
const EXEC_SETTLE_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_engine_error(e: bollard::errors::Error, operation: &str) -> DriverError {
    DriverError::Engine {
        operation: operation.to_string(),
        message: e.to_string(),
    }
}

fn map_container_error(e: bollard::errors::Error, name: &str, operation: &str) -> DriverError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            DriverError::ContainerNotFound {
                name: name.to_string(),
            }
        }
        _ => map_engine_error(e, operation),
    }
}

/// Identify a listed project container.
///
/// The compose labels win over the container name. Containers that carry
/// neither a usable label pair nor a parseable name are skipped.
fn identify(project: &str, container: &ContainerSummaryModel) -> Option<ContainerSummary> {
    let raw_name = container
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/'))
        .unwrap_or_default();

    let labelled = container.labels.as_ref().and_then(|labels| {
        let service = labels.get(SERVICE_LABEL)?;
        let instance = labels
            .get(NUMBER_LABEL)?
            .parse::<InstanceNum>()
            .ok()
            .filter(|n| *n > 0)?;
        Some(ContainerName::new(project, service, instance))
    });

    let name = match labelled {
        Some(name) => name,
        None => match ContainerName::parse(project, raw_name) {
            Ok(name) => name,
            Err(e) => {
                warn!(container = raw_name, error = %e, "cannot identify project container, skipping");
                return None;
            }
        },
    };

    if name.to_string() != raw_name {
        warn!(
            container = raw_name,
            expected = %name,
            "container name does not follow the project_service_instance scheme"
        );
    }

    let running = matches!(container.state, Some(ContainerSummaryStateEnum::RUNNING));
    Some(ContainerSummary { name, running })
}

/// Driver for a compose project on the local engine.
pub struct ComposeDriver {
    client: Docker,
    compose: ComposeCommand,
    project: String,
    discovery_service: String,
}

impl ComposeDriver {
    pub fn new(
        client: Docker,
        compose: ComposeCommand,
        project: &str,
        discovery_service: &str,
    ) -> Self {
        Self {
            client,
            compose,
            project: project.to_string(),
            discovery_service: discovery_service.to_string(),
        }
    }

    /// Connect to the local engine socket and prepare compose invocations.
    pub fn connect(config: &Config) -> crate::error::Result<Self> {
        let client =
            Docker::connect_with_local_defaults().map_err(|e| DriverError::Connection {
                message: e.to_string(),
            })?;
        let compose = ComposeCommand::from_config(config)?;

        Ok(Self::new(
            client,
            compose,
            &config.project,
            &config.discovery_service,
        ))
    }

    pub fn compose(&self) -> &ComposeCommand {
        &self.compose
    }

    /// Exit code of a finished exec.
    ///
    /// The engine can still mark an exec as running for a moment after its
    /// output stream closed, without an exit code yet.
    async fn settled_exit_code(&self, exec_id: &str) -> Result<Option<i64>, DriverError> {
        for _ in 0..EXEC_SETTLE_ATTEMPTS {
            let details = self
                .client
                .inspect_exec(exec_id)
                .await
                .map_err(|e| map_engine_error(e, "exec"))?;

            if details.running != Some(true) {
                return Ok(details.exit_code);
            }
            tokio::time::sleep(EXEC_SETTLE_INTERVAL).await;
        }
        Ok(None)
    }

    fn scale_args(service: &ServiceDeclaration, replicas: u32) -> Vec<String> {
        args([
            "up".to_string(),
            "-d".to_string(),
            "--no-deps".to_string(),
            "--no-recreate".to_string(),
            "--scale".to_string(),
            format!("{}={}", service.name(), replicas),
            service.name().to_string(),
        ])
    }

    fn up_args(service: &ServiceDeclaration, opts: &UpOptions) -> Vec<String> {
        let mut argv = args(["up", "-d"]);
        if opts.no_recreate {
            argv.push("--no-recreate".to_string());
        }
        if opts.force_recreate {
            argv.push("--force-recreate".to_string());
        }
        argv.push("--scale".to_string());
        argv.push(format!("{}={}", service.name(), service.desired_replicas()));
        argv.push(service.name().to_string());
        argv.extend(opts.extra_args.iter().cloned());
        argv
    }
}

#[async_trait]
impl ReplicaOps for ComposeDriver {
    fn project_name(&self) -> &str {
        &self.project
    }

    async fn scale(&self, service: &ServiceDeclaration, replicas: u32) -> Result<(), DriverError> {
        self.compose.run(&Self::scale_args(service, replicas)).await?;
        Ok(())
    }

    async fn list_project_containers(
        &self,
        only_running: bool,
    ) -> Result<Vec<ContainerSummary>, DriverError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{}={}", PROJECT_LABEL, self.project)],
        );

        let opts = ListContainersOptions {
            all: !only_running,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| map_engine_error(e, "list containers"))?;

        Ok(containers
            .iter()
            .filter_map(|c| identify(&self.project, c))
            .collect())
    }

    async fn inspect_container(&self, name: &ContainerName) -> Result<ContainerInfo, DriverError> {
        let container = name.to_string();
        let details = self
            .client
            .inspect_container(&container, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_container_error(e, &container, "inspect"))?;

        let raw = serde_json::to_value(&details).unwrap_or(serde_json::Value::Null);

        let running = details
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);

        let health = details
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .and_then(|s| match s {
                bollard::models::HealthStatusEnum::STARTING => Some(HealthState::Starting),
                bollard::models::HealthStatusEnum::HEALTHY => Some(HealthState::Healthy),
                bollard::models::HealthStatusEnum::UNHEALTHY => Some(HealthState::Unhealthy),
                _ => None,
            });

        let started_at = details
            .state
            .as_ref()
            .and_then(|s| s.started_at.as_ref())
            .map(|t| t.to_string());

        let (image, healthcheck_test) = match details.config {
            Some(ref config) => (
                config.image.clone(),
                config.healthcheck.as_ref().and_then(|h| h.test.clone()),
            ),
            None => (None, None),
        };

        Ok(ContainerInfo {
            id: details.id.clone().unwrap_or_default(),
            name: details
                .name
                .clone()
                .unwrap_or(container)
                .trim_start_matches('/')
                .to_string(),
            image,
            running,
            health,
            healthcheck_test,
            started_at,
            raw,
        })
    }

    async fn remove_container(&self, name: &ContainerName) -> Result<(), DriverError> {
        let container = name.to_string();
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.client
            .remove_container(&container, Some(opts))
            .await
            .map_err(|e| map_container_error(e, &container, "remove"))
    }

    async fn exec_in_container(
        &self,
        name: &ContainerName,
        command: &[String],
    ) -> Result<ExecResult, DriverError> {
        let container = name.to_string();
        let exec_config = bollard::models::ExecConfig {
            cmd: Some(command.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(&container, exec_config)
            .await
            .map_err(|e| map_container_error(e, &container, "exec"))?;

        let opts = StartExecOptions {
            detach: false,
            ..Default::default()
        };
        let started = self
            .client
            .start_exec(&exec.id, Some(opts))
            .await
            .map_err(|e| map_engine_error(e, "exec"))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        if let bollard::exec::StartExecResults::Attached { mut output, .. } = started {
            while let Some(item) = output.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.extend(message);
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.extend(message);
                    }
                    Ok(_) => {}
                    Err(e) => return Err(map_engine_error(e, "exec")),
                }
            }
        }

        let exit_code = self.settled_exit_code(&exec.id).await?;
        if exit_code.is_none() {
            warn!(container = %container, "engine reported no exit code for exec");
        }

        Ok(ExecResult {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    async fn pause_discovery(&self) -> Result<(), DriverError> {
        self.compose
            .run(&args(["stop", self.discovery_service.as_str()]))
            .await?;
        Ok(())
    }

    async fn resume_discovery(&self) -> Result<(), DriverError> {
        self.compose
            .run(&args([
                "up",
                "-d",
                "--no-recreate",
                self.discovery_service.as_str(),
            ]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceOps for ComposeDriver {
    async fn compose_config(&self) -> Result<String, DriverError> {
        Ok(self.compose.run(&args(["config"])).await?.stdout)
    }

    async fn up(&self, service: &ServiceDeclaration, opts: &UpOptions) -> Result<(), DriverError> {
        opts.validate()?;
        self.compose.run(&Self::up_args(service, opts)).await?;
        Ok(())
    }

    async fn stop(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError> {
        let mut argv = args(["stop", service]);
        argv.extend_from_slice(extra_args);
        self.compose.run(&argv).await?;
        Ok(())
    }

    async fn restart(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError> {
        let mut argv = args(["restart", service]);
        argv.extend_from_slice(extra_args);
        self.compose.run(&argv).await?;
        Ok(())
    }

    async fn rm(&self, service: &str, extra_args: &[String]) -> Result<(), DriverError> {
        let mut argv = args(["rm", "--stop", "--force", service]);
        argv.extend_from_slice(extra_args);
        self.compose.run(&argv).await?;
        Ok(())
    }

    async fn pull(&self, services: &[String]) -> Result<(), DriverError> {
        let mut argv = args(["pull"]);
        argv.extend_from_slice(services);
        self.compose.run(&argv).await?;
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), DriverError> {
        self.client
            .remove_image(image, None::<RemoveImageOptions>, None)
            .await
            .map_err(|e| map_engine_error(e, &format!("remove image {}", image)))?;
        Ok(())
    }

    async fn container_logs(
        &self,
        name: &ContainerName,
        opts: &LogOptions,
    ) -> Result<LogLines, DriverError> {
        let log_opts = LogsOptions {
            stdout: true,
            stderr: true,
            follow: opts.follow,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let container = name.to_string();
        let stream = self.client.logs(&container, Some(log_opts));

        let mapped = stream.map(move |result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };
                    LogLine {
                        content: String::from_utf8_lossy(&data).to_string(),
                        stream,
                    }
                })
                .map_err(|e| map_container_error(e, &container, "logs"))
        });

        Ok(Box::pin(mapped))
    }

    async fn exec_passthrough(
        &self,
        name: &ContainerName,
        command: &[String],
        tty: bool,
    ) -> Result<i32, DriverError> {
        let mut argv = args(["exec"]);
        if !tty {
            argv.push("-T".to_string());
        }
        argv.push(format!("--index={}", name.instance()));
        argv.push(name.service().to_string());
        argv.extend_from_slice(command);
        self.compose.run_attached(&argv).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(
        name: &str,
        labels: &[(&str, &str)],
        state: ContainerSummaryStateEnum,
    ) -> ContainerSummaryModel {
        ContainerSummaryModel {
            names: Some(vec![format!("/{}", name)]),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            state: Some(state),
            ..Default::default()
        }
    }

    #[test]
    fn identifies_containers_by_compose_labels() {
        let container = listed(
            "shop-website-3",
            &[(SERVICE_LABEL, "website"), (NUMBER_LABEL, "3")],
            ContainerSummaryStateEnum::RUNNING,
        );

        let summary = identify("shop", &container).unwrap();

        assert_eq!(summary.name, ContainerName::new("shop", "website", 3));
        assert!(summary.running);
    }

    #[test]
    fn falls_back_to_the_container_name() {
        let container = listed("shop_web_api_2", &[], ContainerSummaryStateEnum::EXITED);

        let summary = identify("shop", &container).unwrap();

        assert_eq!(summary.name.service(), "web_api");
        assert_eq!(summary.name.instance(), 2);
        assert!(!summary.running);
    }

    #[test]
    fn only_the_running_state_counts_as_running() {
        for state in [
            ContainerSummaryStateEnum::CREATED,
            ContainerSummaryStateEnum::PAUSED,
            ContainerSummaryStateEnum::RESTARTING,
            ContainerSummaryStateEnum::DEAD,
        ] {
            let summary = identify("shop", &listed("shop_website_1", &[], state)).unwrap();
            assert!(!summary.running);
        }
    }

    #[test]
    fn unidentifiable_containers_are_skipped() {
        let container = listed(
            "shop-website",
            &[(SERVICE_LABEL, "website"), (NUMBER_LABEL, "zero")],
            ContainerSummaryStateEnum::RUNNING,
        );

        assert!(identify("shop", &container).is_none());
    }

    fn service(labels: &str) -> ServiceDeclaration {
        ServiceDeclaration::new(
            "website",
            serde_yaml::from_str(&format!("image: nginx\nlabels:\n{}", labels)).unwrap(),
        )
    }

    #[test]
    fn scale_keeps_existing_replicas() {
        let argv = ComposeDriver::scale_args(&service("  org.riotkit.replicas: 2\n"), 3);
        assert_eq!(
            argv,
            vec![
                "up",
                "-d",
                "--no-deps",
                "--no-recreate",
                "--scale",
                "website=3",
                "website"
            ]
        );
    }

    #[test]
    fn up_scales_to_declared_replicas() {
        let opts = UpOptions {
            force_recreate: true,
            extra_args: vec!["--remove-orphans".to_string()],
            ..Default::default()
        };
        let argv = ComposeDriver::up_args(&service("  org.riotkit.replicas: 4\n"), &opts);
        assert_eq!(
            argv,
            vec![
                "up",
                "-d",
                "--force-recreate",
                "--scale",
                "website=4",
                "website",
                "--remove-orphans"
            ]
        );
    }
}
