// ABOUTME: Update strategy selection for a service.
// ABOUTME: Resolves `auto` through the service's update strategy label.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::service::ServiceDeclaration;

use super::error::DeployError;

/// Strategy requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Replace replicas one at a time behind a paused service discovery.
    Rolling,
    /// Let compose decide what to recreate.
    Compose,
    /// Remove all containers, then start fresh ones.
    Recreate,
    /// Use the strategy declared on the service, `compose` when none is.
    #[default]
    Auto,
}

impl UpdateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStrategy::Rolling => "rolling",
            UpdateStrategy::Compose => "compose",
            UpdateStrategy::Recreate => "recreate",
            UpdateStrategy::Auto => "auto",
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateStrategy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rolling" => Ok(UpdateStrategy::Rolling),
            "compose" => Ok(UpdateStrategy::Compose),
            "recreate" => Ok(UpdateStrategy::Recreate),
            "auto" => Ok(UpdateStrategy::Auto),
            _ => Err(DeployError::InvalidStrategy(s.to_string())),
        }
    }
}

/// Strategy actually used to deploy a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStrategy {
    Rolling,
    Compose,
    Recreate,
}

impl DeployStrategy {
    /// Determine the strategy for `service`.
    /// Returns the strategy and a reason when it came from the service itself.
    ///
    /// Priority:
    /// 1. Explicit strategy requested by the user
    /// 2. The service's update strategy label
    /// 3. Default to compose
    pub fn for_service(
        requested: UpdateStrategy,
        service: &ServiceDeclaration,
    ) -> Result<(Self, Option<&'static str>), DeployError> {
        match requested {
            UpdateStrategy::Rolling => Ok((DeployStrategy::Rolling, None)),
            UpdateStrategy::Compose => Ok((DeployStrategy::Compose, None)),
            UpdateStrategy::Recreate => Ok((DeployStrategy::Recreate, None)),
            UpdateStrategy::Auto => {
                match service.update_strategy().parse::<UpdateStrategy>()? {
                    UpdateStrategy::Rolling => {
                        Ok((DeployStrategy::Rolling, Some("declared by the service label")))
                    }
                    UpdateStrategy::Recreate => {
                        Ok((DeployStrategy::Recreate, Some("declared by the service label")))
                    }
                    UpdateStrategy::Compose | UpdateStrategy::Auto => {
                        Ok((DeployStrategy::Compose, None))
                    }
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStrategy::Rolling => "rolling",
            DeployStrategy::Compose => "compose",
            DeployStrategy::Recreate => "recreate",
        }
    }
}

impl fmt::Display for DeployStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
