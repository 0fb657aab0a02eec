// ABOUTME: Per-invocation context shared by selector, driver and orchestrator.
// ABOUTME: Owns configuration and the driver, and parses the compose config once.

use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hooks::HookRunner;
use crate::runtime::Driver;
use crate::selector::ProfileLoader;
use crate::service::{ServiceDeclaration, ServiceLocator};

/// State built once per command and passed down by reference.
pub struct HarborContext<R> {
    config: Config,
    runtime: R,
    hooks: HookRunner,
    locator: OnceCell<ServiceLocator>,
}

impl<R: Driver> HarborContext<R> {
    pub fn new(config: Config, runtime: R) -> Self {
        let hooks = HookRunner::new(&config.hooks_dir(), &config.project);
        Self {
            config,
            runtime,
            hooks,
            locator: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn hooks(&self) -> &HookRunner {
        &self.hooks
    }

    /// Services declared across all loaded compose files.
    ///
    /// The rendered compose configuration is requested from the engine on
    /// first use only.
    pub async fn services(&self) -> Result<&ServiceLocator> {
        self.locator
            .get_or_try_init(|| async {
                debug!("loading rendered compose configuration");
                let rendered = self.runtime.compose_config().await?;
                let document: serde_yaml::Value = serde_yaml::from_str(&rendered)?;

                if !document.is_mapping() {
                    return Err(Error::InvalidComposeConfig(
                        "rendered configuration is not a mapping".to_string(),
                    ));
                }

                Ok(ServiceLocator::from_compose(&document))
            })
            .await
    }

    pub async fn service(&self, name: &str) -> Result<ServiceDeclaration> {
        Ok(self.services().await?.get_by_name(name)?)
    }

    /// Services matched by a profile, in start order.
    pub async fn matching_services(&self, profile: Option<&str>) -> Result<Vec<ServiceDeclaration>> {
        let selector = ProfileLoader::new(self.config.apps_dir()).load(profile)?;
        let locator = self.services().await?;
        Ok(selector.find_matching_services(locator))
    }
}
