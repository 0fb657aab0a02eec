// ABOUTME: Container names assigned by compose: {project}_{service}_{instance}.
// ABOUTME: Parses engine listings back into service names and replica numbers.

use std::fmt;
use thiserror::Error;

/// Replica number assigned by the engine when scaling a service.
pub type InstanceNum = u32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error("container \"{name}\" does not belong to project \"{project}\"")]
    ForeignProject { name: String, project: String },

    #[error("container \"{0}\" has no instance number suffix")]
    MissingInstance(String),

    #[error("container \"{0}\" has an invalid instance number")]
    InvalidInstance(String),
}

/// Fully qualified container name of one service replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName {
    project: String,
    service: String,
    instance: InstanceNum,
}

impl ContainerName {
    pub fn new(project: &str, service: &str, instance: InstanceNum) -> Self {
        Self {
            project: project.to_string(),
            service: service.to_string(),
            instance,
        }
    }

    /// Parse a name reported by the engine.
    ///
    /// Service names may contain underscores themselves, so the instance
    /// number is taken from the last `_` separated segment.
    pub fn parse(project: &str, name: &str) -> Result<Self, ContainerNameError> {
        let name = name.trim_start_matches('/');
        let prefix = format!("{}_", project);

        let rest = name
            .strip_prefix(&prefix)
            .ok_or_else(|| ContainerNameError::ForeignProject {
                name: name.to_string(),
                project: project.to_string(),
            })?;

        let (service, instance) = rest
            .rsplit_once('_')
            .filter(|(service, _)| !service.is_empty())
            .ok_or_else(|| ContainerNameError::MissingInstance(name.to_string()))?;

        let instance: InstanceNum = instance
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ContainerNameError::InvalidInstance(name.to_string()))?;

        Ok(Self::new(project, service, instance))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn instance(&self) -> InstanceNum {
        self.instance
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.project, self.service, self.instance)
    }
}
