// ABOUTME: Commands operating on every service matched by a profile.
// ABOUTME: Start, stop, restart, remove, pull, upgrade and list.

use super::{connect, deploy_options, emit_warnings};
use crate::cli::{GroupBy, ProfileArgs, StartArgs};
use harbor::deploy::{self, BatchReport};
use harbor::diagnostics::Diagnostics;
use harbor::error::{Error, Result};
use harbor::output::{Output, table};
use harbor::runtime::ReplicaOps;
use harbor::service::ServiceDeclaration;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub async fn start(dir: &Path, args: StartArgs, mut output: Output) -> Result<()> {
    output.start_timer();
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.selection.profile.as_deref()).await?;
    let opts = deploy_options(&args.rollout, ctx.config());
    let mut diag = Diagnostics::default();

    output.progress(&format!("Starting {} service(s)", services.len()));
    let report = deploy::start_services(&ctx, &services, &opts, &mut diag).await?;

    finish_batch(&report, &diag, &output, "Started")
}

pub async fn upgrade(dir: &Path, args: StartArgs, mut output: Output) -> Result<()> {
    output.start_timer();
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.selection.profile.as_deref()).await?;
    let opts = deploy_options(&args.rollout, ctx.config());
    let mut diag = Diagnostics::default();

    output.progress(&format!("Upgrading {} service(s)", services.len()));
    let report = deploy::upgrade(&ctx, &services, &opts, &mut diag).await?;

    finish_batch(&report, &diag, &output, "Upgraded")
}

fn finish_batch(report: &BatchReport, diag: &Diagnostics, output: &Output, verb: &str) -> Result<()> {
    emit_warnings(diag, output);
    output.data(report, || {
        let rows: Vec<Vec<String>> = report
            .started
            .iter()
            .map(|d| vec![d.service.clone(), d.strategy.to_string(), "ok".to_string()])
            .chain(
                report
                    .failed
                    .iter()
                    .map(|f| vec![f.service.clone(), "-".to_string(), f.error.clone()]),
            )
            .collect();
        table(&["Service", "Strategy", "Result"], &rows)
    });

    if !report.is_success() {
        return Err(Error::ServicesFailed {
            failed: report.failed.len(),
            total: report.total(),
        });
    }

    output.success(&format!("{verb} {} service(s)", report.started.len()));
    Ok(())
}

pub async fn stop(dir: &Path, args: ProfileArgs, output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.profile.as_deref()).await?;
    deploy::stop_services(&ctx, &services).await?;
    output.success(&format!("Stopped {} service(s)", services.len()));
    Ok(())
}

pub async fn restart(dir: &Path, args: ProfileArgs, output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.profile.as_deref()).await?;
    deploy::restart_services(&ctx, &services).await?;
    output.success(&format!("Restarted {} service(s)", services.len()));
    Ok(())
}

pub async fn remove(dir: &Path, args: ProfileArgs, with_image: bool, output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.profile.as_deref()).await?;
    let mut diag = Diagnostics::default();

    let removed = deploy::remove_services(&ctx, &services, with_image, &mut diag).await?;

    emit_warnings(&diag, &output);
    if with_image {
        output.progress(&format!("Removed {} image(s)", removed.len()));
    }
    output.success(&format!("Removed {} service(s)", services.len()));
    Ok(())
}

pub async fn pull(dir: &Path, args: ProfileArgs, output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.profile.as_deref()).await?;
    deploy::pull_services(&ctx, &services).await?;
    output.success(&format!("Pulled images of {} service(s)", services.len()));
    Ok(())
}

#[derive(Debug, Serialize)]
struct ServiceRow {
    priority: i64,
    name: String,
    declared_version: String,
    replicas_running: usize,
    replicas_desired: u32,
    domains: Vec<String>,
    ports: Vec<String>,
    maintenance_mode: bool,
    update_strategy: String,
    watchtower: bool,
}

impl ServiceRow {
    fn new(service: &ServiceDeclaration, running: usize, domains: Vec<String>) -> Self {
        Self {
            priority: service.priority(),
            name: service.name().to_string(),
            declared_version: service.declared_version(),
            replicas_running: running,
            replicas_desired: service.desired_replicas(),
            domains,
            ports: service.ports(),
            maintenance_mode: service.uses_maintenance_mode(),
            update_strategy: service.update_strategy(),
            watchtower: service.uses_watchtower(),
        }
    }

    fn cells(&self) -> Vec<String> {
        let or_dash = |values: &[String]| {
            if values.is_empty() {
                "-".to_string()
            } else {
                values.join(",")
            }
        };

        vec![
            self.priority.to_string(),
            self.name.clone(),
            self.declared_version.clone(),
            format!("[{}/{}]", self.replicas_running, self.replicas_desired),
            or_dash(&self.domains),
            or_dash(&self.ports),
            if self.maintenance_mode { "Available" } else { "N/A" }.to_string(),
            self.update_strategy.clone(),
            if self.watchtower { "Active" } else { "Not active" }.to_string(),
        ]
    }
}

pub async fn list(dir: &Path, args: ProfileArgs, group_by: GroupBy, output: Output) -> Result<()> {
    let ctx = connect(dir)?;
    let services = ctx.matching_services(args.profile.as_deref()).await?;
    let running: BTreeMap<String, usize> = ctx
        .runtime()
        .created_containers(true)
        .await?
        .into_iter()
        .map(|(service, replicas)| (service, replicas.len()))
        .collect();

    let mut rows = Vec::new();
    for service in &services {
        let count = running.get(service.name()).copied().unwrap_or(0);
        let domains = service.domains();

        match group_by {
            GroupBy::Url if !domains.is_empty() => {
                for domain in domains {
                    rows.push(ServiceRow::new(service, count, vec![domain]));
                }
            }
            GroupBy::Url | GroupBy::None => rows.push(ServiceRow::new(service, count, domains)),
        }
    }

    output.data(&rows, || {
        let body: Vec<Vec<String>> = rows.iter().map(ServiceRow::cells).collect();
        table(
            &[
                "Priority",
                "Name",
                "Declared version",
                "Replicas",
                "URL",
                "Ports",
                "Maintenance mode",
                "Update strategy",
                "Watchtower",
            ],
            &body,
        )
    });
    Ok(())
}
