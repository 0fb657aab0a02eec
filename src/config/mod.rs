// ABOUTME: Project configuration from harbor.yml overlaid with environment variables.
// ABOUTME: Resolves paths, development mode and the compose file list for the project.

pub mod compose_files;
pub mod dotenv;
mod env_value;

pub use env_value::{EnvValue, resolve_env_map};

use crate::error::{Error, Result};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "harbor.yml";
pub const CONFIG_FILENAME_ALT: &str = "harbor.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".harbor/config.yml";

pub const ENV_PROJECT_NAME: &str = "COMPOSE_PROJECT_NAME";
pub const ENV_APPS_PATH: &str = "APPS_PATH";
pub const ENV_HOOKS_PATH: &str = "HOOKS_PATH";
pub const ENV_DATA_PATH: &str = "DATA_PATH";
pub const ENV_DOMAIN_SUFFIX: &str = "DOMAIN_SUFFIX";
pub const ENV_COMPOSE_BINARY: &str = "HARBOR_COMPOSE_BINARY";
pub const ENV_DISCOVERY_SERVICE: &str = "HARBOR_DISCOVERY_SERVICE";
pub const ENV_GATEWAY_SERVICE: &str = "HARBOR_GATEWAY_SERVICE";
pub const ENV_HEALTH_TIMEOUT: &str = "HARBOR_HEALTH_TIMEOUT";

/// Domain suffixes that mark a local development environment.
const DEV_DOMAIN_SUFFIXES: &[&str] = &[".localhost", ".xip.io"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Compose project name, prefix of every container name.
    #[serde(default)]
    pub project: String,

    #[serde(default = "default_apps_path")]
    pub apps_path: PathBuf,

    #[serde(default = "default_hooks_path")]
    pub hooks_path: PathBuf,

    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default)]
    pub domain_suffix: String,

    #[serde(default = "default_compose_binary")]
    pub compose_binary: String,

    /// Service that regenerates gateway routing; paused during rolling updates.
    #[serde(default = "default_discovery_service")]
    pub discovery_service: String,

    /// Reverse proxy service reloaded after upgrades.
    #[serde(default = "default_gateway_service")]
    pub gateway_service: String,

    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    /// Extra variables for every compose invocation.
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(skip, default = "default_project_dir")]
    pub project_dir: PathBuf,
}

fn default_apps_path() -> PathBuf {
    PathBuf::from("./apps/")
}

fn default_hooks_path() -> PathBuf {
    PathBuf::from("./hooks.d/")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data/")
}

fn default_compose_binary() -> String {
    "docker-compose".to_string()
}

fn default_discovery_service() -> String {
    "gateway_proxy_gen".to_string()
}

fn default_gateway_service() -> String {
    "gateway".to_string()
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            project: String::new(),
            apps_path: default_apps_path(),
            hooks_path: default_hooks_path(),
            data_path: default_data_path(),
            domain_suffix: String::new(),
            compose_binary: default_compose_binary(),
            discovery_service: default_discovery_service(),
            gateway_service: default_gateway_service(),
            health_timeout: default_health_timeout(),
            env: BTreeMap::new(),
            project_dir: default_project_dir(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the project configuration rooted at `dir`.
    ///
    /// The config file is optional. Process environment variables win over
    /// the project's `.env` file, which wins over the config file.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        let mut config = match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::load(path)?,
            None => Config::default(),
        };
        config.project_dir = dir.to_path_buf();

        let dotenv = dotenv::load(dir)?;
        let lookup = environment_lookup(dotenv);
        config.apply_env(&lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Override settings from environment variables.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup(ENV_PROJECT_NAME) {
            self.project = v;
        }
        if let Some(v) = lookup(ENV_APPS_PATH) {
            self.apps_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_HOOKS_PATH) {
            self.hooks_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DOMAIN_SUFFIX) {
            self.domain_suffix = v;
        }
        if let Some(v) = lookup(ENV_COMPOSE_BINARY) {
            self.compose_binary = v;
        }
        if let Some(v) = lookup(ENV_DISCOVERY_SERVICE) {
            self.discovery_service = v;
        }
        if let Some(v) = lookup(ENV_GATEWAY_SERVICE) {
            self.gateway_service = v;
        }
        if let Some(v) = lookup(ENV_HEALTH_TIMEOUT) {
            self.health_timeout = parse_duration(ENV_HEALTH_TIMEOUT, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::MissingProjectName);
        }
        if self.compose_binary.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "compose binary cannot be empty".to_string(),
            ));
        }
        if self.health_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "health_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// True for local development setups, which load extra compose files.
    pub fn is_dev_environment(&self) -> bool {
        DEV_DOMAIN_SUFFIXES
            .iter()
            .any(|suffix| self.domain_suffix.ends_with(suffix))
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.resolve(&self.apps_path)
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.resolve(&self.hooks_path)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.data_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn compose_files(&self) -> Result<NonEmpty<PathBuf>> {
        compose_files::discover(&self.project_dir, &self.apps_dir(), self.is_dev_environment())
    }

    /// Variables exported to every compose process.
    pub fn compose_env(&self) -> Result<BTreeMap<String, String>> {
        let mut vars = resolve_env_map(&self.env, &|key| std::env::var(key).ok())?;
        vars.insert(
            "IS_DEBUG_ENVIRONMENT".to_string(),
            if self.is_dev_environment() { "1" } else { "0" }.to_string(),
        );
        Ok(vars)
    }

    pub fn template() -> Self {
        Config {
            project: "my-project".to_string(),
            domain_suffix: ".localhost".to_string(),
            ..Config::default()
        }
    }
}

fn environment_lookup(dotenv: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    serde_yaml::from_value::<humantime_serde::Serde<Duration>>(serde_yaml::Value::String(
        value.to_string(),
    ))
    .map(humantime_serde::Serde::into_inner)
    .map_err(|e| Error::InvalidConfig(format!("{}: {}", key, e)))
}

pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();
    if let Some(p) = project {
        config.project = p.to_string();
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;
    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"project: {}
apps_path: {}
hooks_path: {}
domain_suffix: {}
health_timeout: {}s
"#,
        config.project,
        config.apps_path.display(),
        config.hooks_path.display(),
        config.domain_suffix,
        config.health_timeout.as_secs()
    )
}
