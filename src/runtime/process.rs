// ABOUTME: Compose command runner built on tokio::process.
// ABOUTME: Holds the project-wide compose arguments and turns exit codes into driver errors.

use nonempty::NonEmpty;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::error::{DriverError, SpawnSnafu};
use crate::config::Config;

const COMPATIBILITY_VAR: &str = "COMPOSE_COMPATIBILITY";

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout and stderr together, the way a terminal would show them.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Compose invocation bound to one project and its file list.
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    program: String,
    base_args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ComposeCommand {
    pub fn new(
        program: &str,
        project_dir: &Path,
        project: &str,
        files: &NonEmpty<PathBuf>,
        mut env: BTreeMap<String, String>,
    ) -> Self {
        // Compose v2 joins container names with `-` unless asked not to.
        env.entry(COMPATIBILITY_VAR.to_string())
            .or_insert_with(|| "true".to_string());

        let mut base_args = vec![
            format!("--project-directory={}", project_dir.display()),
            "-p".to_string(),
            project.to_string(),
        ];
        for file in files.iter() {
            base_args.push("-f".to_string());
            base_args.push(file.display().to_string());
        }

        Self {
            program: program.to_string(),
            base_args,
            env,
        }
    }

    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        Ok(Self::new(
            &config.compose_binary,
            &config.project_dir,
            &config.project,
            &config.compose_files()?,
            config.compose_env()?,
        ))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector for a compose subcommand.
    pub fn argv(&self, args: &[String]) -> Vec<String> {
        self.base_args.iter().chain(args).cloned().collect()
    }

    fn display(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv(args)).envs(&self.env);
        cmd
    }

    /// Run and capture output, whatever the exit code.
    pub async fn output(&self, args: &[String]) -> Result<CommandOutput, DriverError> {
        debug!(command = %self.display(args), "running compose");

        let output = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context(SpawnSnafu {
                program: self.program.clone(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run and fail on a non-zero exit code.
    pub async fn run(&self, args: &[String]) -> Result<CommandOutput, DriverError> {
        let output = self.output(args).await?;
        if !output.success() {
            return Err(DriverError::CommandFailed {
                command: self.display(args),
                code: output.code,
                output: output.combined(),
            });
        }
        Ok(output)
    }

    /// Run with the terminal attached and return the exit code.
    pub async fn run_attached(&self, args: &[String]) -> Result<i32, DriverError> {
        debug!(command = %self.display(args), "running compose attached");

        let status = self
            .command(args)
            .status()
            .await
            .context(SpawnSnafu {
                program: self.program.clone(),
            })?;

        Ok(status.code().unwrap_or(1))
    }
}

/// Build an argument vector from string literals.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose() -> ComposeCommand {
        let files = NonEmpty::from_vec(vec![
            PathBuf::from("/srv/docker-compose.yml"),
            PathBuf::from("/srv/apps/conf/web.yml"),
        ])
        .unwrap();
        ComposeCommand::new(
            "docker-compose",
            Path::new("/srv"),
            "prod",
            &files,
            BTreeMap::new(),
        )
    }

    #[test]
    fn container_names_use_underscores() {
        assert_eq!(compose().env[COMPATIBILITY_VAR], "true");
    }

    #[test]
    fn argv_starts_with_project_arguments() {
        let argv = compose().argv(&args(["up", "-d", "web"]));
        assert_eq!(
            argv,
            vec![
                "--project-directory=/srv",
                "-p",
                "prod",
                "-f",
                "/srv/docker-compose.yml",
                "-f",
                "/srv/apps/conf/web.yml",
                "up",
                "-d",
                "web",
            ]
        );
    }

    #[test]
    fn combined_output_prefers_available_streams() {
        let out = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert_eq!(out.combined(), "boom");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn non_zero_exit_is_command_failure() {
        let files = NonEmpty::new(PathBuf::from("docker-compose.yml"));
        let cmd = ComposeCommand::new("false", Path::new("."), "prod", &files, BTreeMap::new());
        let err = cmd.run(&args(["ps"])).await.unwrap_err();
        assert!(matches!(err, DriverError::CommandFailed { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let files = NonEmpty::new(PathBuf::from("docker-compose.yml"));
        let cmd = ComposeCommand::new(
            "/nonexistent/compose",
            Path::new("."),
            "prod",
            &files,
            BTreeMap::new(),
        );
        let err = cmd.output(&args(["ps"])).await.unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }
}
