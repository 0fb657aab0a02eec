// ABOUTME: A single service declaration from the merged compose configuration.
// ABOUTME: Reads replicas, strategy, priority, domains and image from labels and fields.

use serde_yaml::Value;
use tracing::warn;

pub const REPLICAS_LABEL: &str = "org.riotkit.replicas";
pub const UPDATE_STRATEGY_LABEL: &str = "org.riotkit.updateStrategy";
pub const PRIORITY_LABEL: &str = "org.riotkit.priority";
pub const MAINTENANCE_MODE_LABEL: &str = "org.riotkit.useMaintenanceMode";
pub const WATCHTOWER_LABEL: &str = "com.centurylinklabs.watchtower.enable";

pub const DEFAULT_REPLICAS: u32 = 1;
pub const DEFAULT_PRIORITY: i64 = 1000;
pub const DEFAULT_UPDATE_STRATEGY: &str = "compose";
/// Image name compose uses for services built locally without an `image` key.
pub const LOCAL_BUILD_IMAGE: &str = "_docker_build_local:latest";

/// A named service with its raw definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDeclaration {
    name: String,
    definition: Value,
}

impl ServiceDeclaration {
    pub fn new(name: impl Into<String>, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// Labels in either mapping form or `key=value` list form.
    pub fn labels(&self) -> Vec<(String, String)> {
        match self.definition.get("labels") {
            Some(Value::Mapping(map)) => map
                .iter()
                .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
                .collect(),
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (item.to_string(), String::new()),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.labels()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Number of replicas the service should run.
    ///
    /// Zero or unparsable values fall back to the default.
    pub fn desired_replicas(&self) -> u32 {
        self.numeric_label(REPLICAS_LABEL)
            .filter(|n: &u32| *n > 0)
            .unwrap_or(DEFAULT_REPLICAS)
    }

    /// Update strategy name as declared, before validation.
    pub fn update_strategy(&self) -> String {
        self.label(UPDATE_STRATEGY_LABEL)
            .unwrap_or_else(|| DEFAULT_UPDATE_STRATEGY.to_string())
    }

    /// Start ordering priority. Lower values start first.
    pub fn priority(&self) -> i64 {
        self.numeric_label(PRIORITY_LABEL)
            .unwrap_or(DEFAULT_PRIORITY)
    }

    fn numeric_label<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.label(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    service = %self.name,
                    label = key,
                    value = %raw,
                    "label is not a valid number, using the default"
                );
                None
            }
        }
    }

    pub fn uses_maintenance_mode(&self) -> bool {
        self.label(MAINTENANCE_MODE_LABEL)
            .is_some_and(|v| is_truthy(&v))
    }

    pub fn uses_watchtower(&self) -> bool {
        self.label(WATCHTOWER_LABEL).is_some_and(|v| is_truthy(&v))
    }

    /// Domains routed to this service, from the `VIRTUAL_HOST` variable.
    pub fn domains(&self) -> Vec<String> {
        self.environment("VIRTUAL_HOST")
            .map(|hosts| {
                hosts
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains().iter().any(|d| d == domain)
    }

    /// A variable from the `environment` section, mapping or list form.
    pub fn environment(&self, key: &str) -> Option<String> {
        match self.definition.get("environment")? {
            Value::Mapping(map) => map.get(key).and_then(scalar_to_string),
            Value::Sequence(items) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|item| item.split_once('='))
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()),
            _ => None,
        }
    }

    pub fn ports(&self) -> Vec<String> {
        match self.definition.get("ports") {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn image(&self) -> String {
        self.definition
            .get("image")
            .and_then(Value::as_str)
            .unwrap_or(LOCAL_BUILD_IMAGE)
            .to_string()
    }

    pub fn is_locally_built(&self) -> bool {
        self.definition.get("image").is_none()
    }

    /// Image tag the service is declared to run.
    pub fn declared_version(&self) -> String {
        if self.is_locally_built() {
            return "latest (build)".to_string();
        }

        let image = self.image();
        match image.rsplit_once(':') {
            Some((_, tag)) if !tag.contains('/') => tag.to_string(),
            _ => "latest".to_string(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "TRUE" | "True")
}
