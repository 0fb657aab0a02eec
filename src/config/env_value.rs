// ABOUTME: Environment values passed to compose, literal or taken from the environment.
// ABOUTME: Resolves references through the same lookup as the project settings.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => lookup(var)
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }
}

pub fn resolve_env_map(
    map: &BTreeMap<String, EnvValue>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<BTreeMap<String, String>> {
    map.iter()
        .map(|(k, v)| v.resolve(lookup).map(|resolved| (k.clone(), resolved)))
        .collect()
}
