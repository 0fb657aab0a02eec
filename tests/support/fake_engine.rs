// ABOUTME: In-memory container engine implementing the driver traits.
// ABOUTME: Numbers replicas like compose, scripts health checks and records every call.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use harbor::runtime::{
    ContainerInfo, ContainerSummary, DriverError, ExecResult, HealthState, LogLine, LogLines,
    LogOptions, LogStream, ReplicaOps, ServiceOps, UpOptions,
};
use harbor::service::ServiceDeclaration;
use harbor::types::{ContainerName, InstanceNum};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

pub const PROJECT: &str = "harbor";
const HEALTH_CHECK: &[&str] = &["CMD-SHELL", "check"];
const DEFAULT_IMAGE: &str = "app:1.0";

/// How a replica answers health inspections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// No health check declared.
    NoCheck,
    Healthy,
    Unhealthy,
    /// Engine reports `starting`; the manual check ends with this exit code,
    /// `None` meaning the engine never reports one.
    Starting { manual_exit: Option<i64> },
    /// Reports `starting` until inspected this many times, then `healthy`.
    HealthyAfter(u32),
}

/// An engine call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scale { service: String, replicas: u32 },
    Inspect(String),
    Remove(String),
    Exec { container: String, command: Vec<String> },
    PauseDiscovery,
    ResumeDiscovery,
    Up { service: String, no_recreate: bool, force_recreate: bool },
    Stop(String),
    Restart(String),
    Rm(String),
    Pull(Vec<String>),
    RemoveImage(String),
    Logs(String),
    ExecPassthrough(String),
}

#[derive(Debug, Clone)]
struct Replica {
    image: String,
    running: bool,
    inspections: u32,
}

#[derive(Debug, Default)]
struct State {
    services: BTreeMap<String, BTreeMap<InstanceNum, Replica>>,
    last_instance: BTreeMap<String, InstanceNum>,
    images: BTreeMap<String, String>,
    default_health: Option<Health>,
    health: BTreeMap<(String, InstanceNum), Health>,
    exec_exit: BTreeMap<String, i64>,
    failing_images: BTreeSet<String>,
    fail_scale: bool,
    fail_pause: bool,
    logs: Vec<String>,
    follow_forever: bool,
    max_live: BTreeMap<String, usize>,
    min_live: BTreeMap<String, usize>,
    calls: Vec<Call>,
}

impl State {
    fn add_replica(&mut self, service: &str) -> InstanceNum {
        let next = self.last_instance.get(service).copied().unwrap_or(0) + 1;
        self.last_instance.insert(service.to_string(), next);
        let image = self
            .images
            .get(service)
            .cloned()
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
        self.services.entry(service.to_string()).or_default().insert(
            next,
            Replica {
                image,
                running: true,
                inspections: 0,
            },
        );
        next
    }

    /// Scale like compose: new replicas get fresh numbers, scaling down
    /// drops the highest numbers.
    fn scale_to(&mut self, service: &str, replicas: u32) {
        let target = replicas as usize;
        while self.live(service) < target {
            self.add_replica(service);
            self.track(service);
        }
        while self.live(service) > target {
            if let Some(replicas) = self.services.get_mut(service) {
                replicas.pop_last();
            }
            self.track(service);
        }
    }

    fn live(&self, service: &str) -> usize {
        self.services.get(service).map_or(0, BTreeMap::len)
    }

    fn track(&mut self, service: &str) {
        let live = self.live(service);
        let max = self.max_live.entry(service.to_string()).or_insert(live);
        *max = (*max).max(live);
        let min = self.min_live.entry(service.to_string()).or_insert(live);
        *min = (*min).min(live);
    }

    fn replica_mut(&mut self, name: &ContainerName) -> Result<&mut Replica, DriverError> {
        self.services
            .get_mut(name.service())
            .and_then(|replicas| replicas.get_mut(&name.instance()))
            .ok_or_else(|| DriverError::ContainerNotFound {
                name: name.to_string(),
            })
    }

    fn health_of(&self, name: &ContainerName) -> Health {
        self.health
            .get(&(name.service().to_string(), name.instance()))
            .copied()
            .or(self.default_health)
            .unwrap_or(Health::Healthy)
    }
}

/// Engine double shared by orchestration tests.
pub struct FakeEngine {
    compose: String,
    state: Mutex<State>,
}

impl FakeEngine {
    /// Engine serving `compose` as the rendered project configuration.
    pub fn new(compose: &str) -> Self {
        Self {
            compose: compose.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Start `count` running replicas numbered from 1.
    pub fn with_replicas(self, service: &str, count: u32) -> Self {
        {
            let mut state = self.state.lock();
            for _ in 0..count {
                state.add_replica(service);
            }
            state.track(service);
        }
        self
    }

    pub fn with_health(self, health: Health) -> Self {
        self.state.lock().default_health = Some(health);
        self
    }

    pub fn with_instance_health(self, service: &str, instance: InstanceNum, health: Health) -> Self {
        self.state
            .lock()
            .health
            .insert((service.to_string(), instance), health);
        self
    }

    /// Image used by replicas created from now on.
    pub fn set_image(&self, service: &str, image: &str) {
        self.state
            .lock()
            .images
            .insert(service.to_string(), image.to_string());
    }

    pub fn with_image(self, service: &str, image: &str) -> Self {
        self.set_image(service, image);
        self
    }

    pub fn with_exec_exit(self, command: &[&str], exit_code: i64) -> Self {
        self.state.lock().exec_exit.insert(command.join(" "), exit_code);
        self
    }

    pub fn with_failing_image_removal(self, image: &str) -> Self {
        self.state.lock().failing_images.insert(image.to_string());
        self
    }

    pub fn failing_scale(self) -> Self {
        self.state.lock().fail_scale = true;
        self
    }

    pub fn failing_pause(self) -> Self {
        self.state.lock().fail_pause = true;
        self
    }

    /// Log output; with `follow_forever` the stream never ends after it.
    pub fn with_logs(self, lines: &[&str], follow_forever: bool) -> Self {
        {
            let mut state = self.state.lock();
            state.logs = lines.iter().map(|l| l.to_string()).collect();
            state.follow_forever = follow_forever;
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn scale_targets(&self, service: &str) -> Vec<u32> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Scale { service: s, replicas } if s == service => Some(*replicas),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Remove(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Exec { container, command } => Some((container.clone(), command.clone())),
                _ => None,
            })
            .collect()
    }

    /// Instance numbers currently present, ascending.
    pub fn instances(&self, service: &str) -> Vec<InstanceNum> {
        self.state
            .lock()
            .services
            .get(service)
            .map(|replicas| replicas.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn max_live(&self, service: &str) -> usize {
        self.state.lock().max_live.get(service).copied().unwrap_or(0)
    }

    pub fn min_live(&self, service: &str) -> usize {
        self.state.lock().min_live.get(service).copied().unwrap_or(0)
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl ReplicaOps for FakeEngine {
    fn project_name(&self) -> &str {
        PROJECT
    }

    async fn scale(&self, service: &ServiceDeclaration, replicas: u32) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Scale {
            service: service.name().to_string(),
            replicas,
        });
        if state.fail_scale {
            return Err(DriverError::CommandFailed {
                command: "docker-compose up --scale".to_string(),
                code: Some(1),
                output: "scale refused".to_string(),
            });
        }
        state.scale_to(service.name(), replicas);
        Ok(())
    }

    async fn list_project_containers(
        &self,
        only_running: bool,
    ) -> Result<Vec<ContainerSummary>, DriverError> {
        let state = self.state.lock();
        Ok(state
            .services
            .iter()
            .flat_map(|(service, replicas)| {
                replicas.iter().map(move |(instance, replica)| ContainerSummary {
                    name: ContainerName::new(PROJECT, service, *instance),
                    running: replica.running,
                })
            })
            .filter(|c| c.running || !only_running)
            .collect())
    }

    async fn inspect_container(&self, name: &ContainerName) -> Result<ContainerInfo, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Inspect(name.to_string()));
        let configured = state.health_of(name);
        let replica = state.replica_mut(name)?;
        replica.inspections += 1;

        let health = match configured {
            Health::NoCheck => None,
            Health::Healthy => Some(HealthState::Healthy),
            Health::Unhealthy => Some(HealthState::Unhealthy),
            Health::Starting { .. } => Some(HealthState::Starting),
            Health::HealthyAfter(n) if replica.inspections >= n => Some(HealthState::Healthy),
            Health::HealthyAfter(_) => Some(HealthState::Starting),
        };

        Ok(ContainerInfo {
            id: format!("id-{name}"),
            name: name.to_string(),
            image: Some(replica.image.clone()),
            running: replica.running,
            healthcheck_test: health
                .map(|_| HEALTH_CHECK.iter().map(|s| s.to_string()).collect()),
            health,
            started_at: Some("2024-03-01T10:00:00.123456789Z".to_string()),
            raw: serde_json::json!({ "Name": format!("/{name}") }),
        })
    }

    async fn remove_container(&self, name: &ContainerName) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Remove(name.to_string()));
        let removed = state
            .services
            .get_mut(name.service())
            .and_then(|replicas| replicas.remove(&name.instance()));
        if removed.is_none() {
            return Err(DriverError::ContainerNotFound {
                name: name.to_string(),
            });
        }
        state.track(name.service());
        Ok(())
    }

    async fn exec_in_container(
        &self,
        name: &ContainerName,
        command: &[String],
    ) -> Result<ExecResult, DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Exec {
            container: name.to_string(),
            command: command.to_vec(),
        });
        state.replica_mut(name)?;

        let is_health_check = command == ["sh", "-c", "check"];
        let exit_code = match state.health_of(name) {
            Health::Starting { manual_exit } if is_health_check => manual_exit,
            Health::HealthyAfter(_) | Health::Unhealthy if is_health_check => Some(1),
            _ => Some(state.exec_exit.get(&command.join(" ")).copied().unwrap_or(0)),
        };

        Ok(ExecResult {
            exit_code,
            stdout: String::new(),
            stderr: if exit_code == Some(0) {
                String::new()
            } else {
                "failed".to_string()
            },
        })
    }

    async fn pause_discovery(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::PauseDiscovery);
        if state.fail_pause {
            return Err(DriverError::Engine {
                operation: "stop discovery".to_string(),
                message: "engine unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn resume_discovery(&self) -> Result<(), DriverError> {
        self.record(Call::ResumeDiscovery);
        Ok(())
    }
}

#[async_trait]
impl ServiceOps for FakeEngine {
    async fn compose_config(&self) -> Result<String, DriverError> {
        Ok(self.compose.clone())
    }

    async fn up(&self, service: &ServiceDeclaration, opts: &UpOptions) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Up {
            service: service.name().to_string(),
            no_recreate: opts.no_recreate,
            force_recreate: opts.force_recreate,
        });
        opts.validate()?;

        if opts.force_recreate {
            state.services.remove(service.name());
        }
        state.scale_to(service.name(), service.desired_replicas());
        Ok(())
    }

    async fn stop(&self, service: &str, _extra_args: &[String]) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Stop(service.to_string()));
        if let Some(replicas) = state.services.get_mut(service) {
            replicas.values_mut().for_each(|r| r.running = false);
        }
        Ok(())
    }

    async fn restart(&self, service: &str, _extra_args: &[String]) -> Result<(), DriverError> {
        self.record(Call::Restart(service.to_string()));
        Ok(())
    }

    async fn rm(&self, service: &str, _extra_args: &[String]) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Rm(service.to_string()));
        state.services.remove(service);
        Ok(())
    }

    async fn pull(&self, services: &[String]) -> Result<(), DriverError> {
        self.record(Call::Pull(services.to_vec()));
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveImage(image.to_string()));
        if state.failing_images.contains(image) {
            return Err(DriverError::Engine {
                operation: "remove image".to_string(),
                message: "image is being used by a running container".to_string(),
            });
        }
        Ok(())
    }

    async fn container_logs(
        &self,
        name: &ContainerName,
        _opts: &LogOptions,
    ) -> Result<LogLines, DriverError> {
        let state = self.state.lock();
        let lines: Vec<Result<LogLine, DriverError>> = state
            .logs
            .iter()
            .map(|content| {
                Ok(LogLine {
                    content: format!("{content}\n"),
                    stream: LogStream::Stdout,
                })
            })
            .collect();
        let follow_forever = state.follow_forever;
        drop(state);
        self.record(Call::Logs(name.to_string()));

        let output = stream::iter(lines);
        if follow_forever {
            Ok(output.chain(stream::pending()).boxed())
        } else {
            Ok(output.boxed())
        }
    }

    async fn exec_passthrough(
        &self,
        name: &ContainerName,
        _command: &[String],
        _tty: bool,
    ) -> Result<i32, DriverError> {
        self.record(Call::ExecPassthrough(name.to_string()));
        Ok(0)
    }
}

/// Compose document with one service per `(name, labels)` entry.
pub fn compose_yaml(services: &[(&str, &[(&str, &str)])]) -> String {
    let mut yaml = String::from("services:\n");
    for (name, labels) in services {
        yaml.push_str(&format!("  {name}:\n    image: {DEFAULT_IMAGE}\n"));
        if !labels.is_empty() {
            yaml.push_str("    labels:\n");
            for (key, value) in *labels {
                yaml.push_str(&format!("      {key}: \"{value}\"\n"));
            }
        }
    }
    yaml
}

/// Declaration parsed the same way the context parses the compose document.
pub fn declaration(name: &str, labels: &[(&str, &str)]) -> ServiceDeclaration {
    let yaml = compose_yaml(&[(name, labels)]);
    let document: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    ServiceDeclaration::new(name, document["services"][name].clone())
}
