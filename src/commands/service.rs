// ABOUTME: Commands operating on a single service or one of its replicas.
// ABOUTME: Up, rm, stop, wait-for, logs, inspect, get-container-name, report and exec.

use super::{connect, deploy_options, emit_warnings};
use crate::cli::ServiceCommand;
use futures::StreamExt;
use harbor::deploy::{self, DeployOptions, HealthOutcome, ServiceReport};
use harbor::diagnostics::Diagnostics;
use harbor::error::{Error, Result};
use harbor::output::{Output, table};
use harbor::runtime::{LogOptions, LogStream, ReplicaOps, ServiceOps};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub async fn service(dir: &Path, command: ServiceCommand, mut output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let runtime = ctx.runtime();

    match command {
        ServiceCommand::Up {
            name,
            rollout,
            dont_recreate,
            extra_args,
        } => {
            output.start_timer();
            let service = ctx.service(&name).await?;
            let opts = DeployOptions {
                no_recreate: dont_recreate,
                extra_args,
                ..deploy_options(&rollout, ctx.config())
            };
            let mut diag = Diagnostics::default();

            let deployment = deploy::deploy_service(&ctx, &service, &opts, &mut diag).await?;

            emit_warnings(&diag, &output);
            output.data(&deployment, || match &deployment.rollout {
                Some(rollout) => {
                    let rows: Vec<Vec<String>> = rollout
                        .replaced
                        .iter()
                        .map(|r| {
                            vec![
                                r.retired.to_string(),
                                r.replacement.to_string(),
                                if r.verified { "healthy" } else { "unverified" }.to_string(),
                            ]
                        })
                        .collect();
                    table(&["Retired", "Replacement", "Health"], &rows)
                }
                None => String::new(),
            });
            output.success(&format!(
                "Service \"{}\" was started ({})",
                deployment.service, deployment.strategy
            ));
            Ok(())
        }

        ServiceCommand::Rm {
            name,
            with_image,
            extra_args,
        } => {
            let service = ctx.service(&name).await?;
            let mut diag = Diagnostics::default();
            deploy::remove_service(&ctx, &service, &extra_args, with_image, &mut diag).await?;
            emit_warnings(&diag, &output);
            output.success(&format!("Service \"{name}\" was removed"));
            Ok(())
        }

        ServiceCommand::Stop { name, extra_args } => {
            ctx.service(&name).await?;
            runtime.stop(&name, &extra_args).await?;
            output.success(&format!("Service \"{name}\" was stopped"));
            Ok(())
        }

        ServiceCommand::WaitFor { target, timeout } => {
            ctx.service(&target.name).await?;
            let (container, outcome) = deploy::wait_for_service(
                runtime,
                &target.name,
                target.instance,
                Duration::from_secs(timeout),
            )
            .await?;

            match outcome {
                HealthOutcome::Healthy { elapsed } => output.success(&format!(
                    "{container} is healthy after {}s",
                    elapsed.as_secs()
                )),
                HealthOutcome::Unverified => {
                    output.warning(&format!("{container} has no health check, assuming it is ready"))
                }
            }
            Ok(())
        }

        ServiceCommand::Logs {
            target,
            follow,
            tail,
        } => {
            let container = runtime
                .find_container_name(&target.name, target.instance)
                .await?;
            let mut lines = runtime
                .container_logs(&container, &LogOptions { follow, tail })
                .await?;

            let mut stdout = std::io::stdout();
            let mut stderr = std::io::stderr();
            while let Some(line) = lines.next().await {
                let line = line?;
                match line.stream {
                    LogStream::Stdout => stdout.write_all(line.content.as_bytes())?,
                    LogStream::Stderr => stderr.write_all(line.content.as_bytes())?,
                }
            }
            stdout.flush()?;
            Ok(())
        }

        ServiceCommand::Inspect { target } => {
            let container = runtime
                .find_container_name(&target.name, target.instance)
                .await?;
            let info = runtime.inspect_container(&container).await?;
            output.data(&info.raw, || {
                serde_json::to_string_pretty(&info.raw).unwrap_or_default()
            });
            Ok(())
        }

        ServiceCommand::GetContainerName { target } => {
            let container = runtime
                .find_container_name(&target.name, target.instance)
                .await?
                .to_string();
            output.data(&container, || container.clone());
            Ok(())
        }

        ServiceCommand::Report { name } => {
            let service = ctx.service(&name).await?;
            let report = deploy::report(runtime, &service).await?;
            output.data(&report, || render_report(&report));
            Ok(())
        }

        ServiceCommand::Exec {
            target,
            no_tty,
            command,
        } => {
            let container = runtime
                .find_container_name(&target.name, target.instance)
                .await?;
            let code = runtime
                .exec_passthrough(&container, &command, !no_tty)
                .await?;
            if code != 0 {
                return Err(Error::CommandExit(code));
            }
            Ok(())
        }
    }
}

fn render_report(report: &ServiceReport) -> String {
    let summary = table(
        &[],
        &[
            vec![
                "Replicas:".to_string(),
                format!("{} of {}", report.replicas_active, report.replicas_desired),
            ],
            vec!["Update strategy:".to_string(), report.update_strategy.clone()],
            vec!["Declared image:".to_string(), report.declared_image.clone()],
            vec!["Startup priority:".to_string(), report.priority.to_string()],
        ],
    );

    if report.containers.is_empty() {
        return summary;
    }

    let rows: Vec<Vec<String>> = report
        .containers
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                format!("{}{}", if c.image_drift { "(!!) " } else { "" }, c.image),
                c.health.clone(),
                c.started_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    format!(
        "{summary}\n{}",
        table(&["Name", "Actual image", "Status", "Started"], &rows)
    )
}
