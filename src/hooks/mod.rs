// ABOUTME: Hooks system for service operation lifecycle events.
// ABOUTME: Runs executable scripts from hooks.d/pre-<action> and hooks.d/post-<action> directories.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// When hooks run relative to the wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the operation. Failure aborts it.
    Pre,
    /// After the operation succeeded.
    Post,
}

impl HookPoint {
    pub fn prefix(&self) -> &'static str {
        match self {
            HookPoint::Pre => "pre",
            HookPoint::Post => "post",
        }
    }

    /// Directory name for an action, e.g. `pre-start`.
    pub fn dir_name(&self, action: &str) -> String {
        format!("{}-{}", self.prefix(), action)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub project: String,
    pub action: String,
    pub service: Option<String>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("HARBOR_PROJECT".to_string(), self.project.clone());
        env.insert("HARBOR_ACTION".to_string(), self.action.clone());
        if let Some(ref service) = self.service {
            env.insert("HARBOR_SERVICE".to_string(), service.clone());
        }
        env
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to execute hook script {}: {source}", script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hook script {} failed with exit code {}: {}", script.display(), exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()), stderr.trim())]
    Failed {
        script: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("cannot read hooks directory {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Discovers and runs hook scripts.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: PathBuf,
    project: String,
}

impl HookRunner {
    pub fn new(hooks_dir: &Path, project: &str) -> Self {
        Self {
            hooks_dir: hooks_dir.to_path_buf(),
            project: project.to_string(),
        }
    }

    pub fn hook_dir(&self, point: HookPoint, action: &str) -> PathBuf {
        self.hooks_dir.join(point.dir_name(action))
    }

    /// Scripts for a hook point in name order. Dotfiles are skipped.
    pub fn scripts(&self, point: HookPoint, action: &str) -> Result<Vec<PathBuf>, HookError> {
        let dir = self.hook_dir(point, action);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| HookError::ReadDir {
            dir: dir.clone(),
            source,
        })?;

        let mut scripts: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        scripts.sort();
        Ok(scripts)
    }

    /// Run every script of a hook point, stopping at the first failure.
    ///
    /// Returns how many scripts ran.
    pub async fn run(
        &self,
        point: HookPoint,
        action: &str,
        service: Option<&str>,
    ) -> Result<usize, HookError> {
        let scripts = self.scripts(point, action)?;
        if scripts.is_empty() {
            tracing::debug!(
                "hooks dir {} not present or empty, skipping",
                self.hook_dir(point, action).display()
            );
            return Ok(0);
        }

        tracing::info!("Executing hook scripts for action \"{}\"", point.dir_name(action));

        let context = HookContext {
            project: self.project.clone(),
            action: point.dir_name(action),
            service: service.map(str::to_string),
        };
        let env_vars = context.to_env();

        for script in &scripts {
            tracing::info!("Running hook script {}", script.display());

            let output = Command::new(script)
                .envs(&env_vars)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|source| HookError::Spawn {
                    script: script.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(HookError::Failed {
                    script: script.clone(),
                    exit_code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                });
            }
        }

        Ok(scripts.len())
    }

    /// Run `pre-<action>` hooks, the operation, then `post-<action>` hooks.
    ///
    /// Post hooks only run when the operation succeeded.
    pub async fn around<F, T, E>(&self, action: &str, service: Option<&str>, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<HookError>,
    {
        self.run(HookPoint::Pre, action, service).await?;
        let value = operation.await?;
        self.run(HookPoint::Post, action, service).await?;
        Ok(value)
    }
}
