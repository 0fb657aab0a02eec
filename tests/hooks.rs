// ABOUTME: Integration tests for hook scripts around deployments.
// ABOUTME: Pre-hooks can veto an operation, post-hooks run only after success.

mod support;

use harbor::config::Config;
use harbor::context::HarborContext;
use harbor::deploy::{self, DeployError, DeployOptions, deploy_service};
use harbor::diagnostics::Diagnostics;
use harbor::hooks::HookError;
use harbor::service::UPDATE_STRATEGY_LABEL;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use support::fake_engine::{FakeEngine, PROJECT, compose_yaml};
use tempfile::TempDir;

fn write_hook(project_dir: &Path, hook_dir: &str, name: &str, body: &str) {
    let dir = project_dir.join("hooks.d").join(hook_dir);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn compose() -> String {
    compose_yaml(&[
        ("website", &[]),
        ("api", &[(UPDATE_STRATEGY_LABEL, "rolling")]),
    ])
}

fn context_with(dir: &Path, engine: FakeEngine) -> HarborContext<FakeEngine> {
    let config = Config {
        project: PROJECT.to_string(),
        project_dir: dir.to_path_buf(),
        ..Config::default()
    };
    HarborContext::new(config, engine)
}

fn context(dir: &Path) -> HarborContext<FakeEngine> {
    context_with(dir, FakeEngine::new(&compose()))
}

#[tokio::test]
async fn failing_pre_hook_prevents_the_deployment() {
    support::init_tracing();
    let dir = TempDir::new().unwrap();
    write_hook(dir.path(), "pre-service-start-website", "10-veto", "echo maintenance >&2; exit 4");
    let ctx = context(dir.path());
    let service = ctx.service("website").await.unwrap();

    let err = deploy_service(&ctx, &service, &DeployOptions::default(), &mut Diagnostics::default())
        .await
        .unwrap_err();

    match err {
        DeployError::Hook(HookError::Failed { exit_code, stderr, .. }) => {
            assert_eq!(exit_code, Some(4));
            assert!(stderr.contains("maintenance"));
        }
        other => panic!("expected a hook failure, got {other:?}"),
    }
    assert!(ctx.runtime().calls().is_empty());
}

#[tokio::test]
async fn hooks_see_project_and_service() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("post.env");
    write_hook(
        dir.path(),
        "post-service-start-website",
        "record",
        &format!(
            "echo \"$HARBOR_PROJECT $HARBOR_SERVICE $HARBOR_ACTION\" > {}",
            marker.display()
        ),
    );
    let ctx = context(dir.path());
    let service = ctx.service("website").await.unwrap();

    deploy_service(&ctx, &service, &DeployOptions::default(), &mut Diagnostics::default())
        .await
        .unwrap();

    let recorded = fs::read_to_string(&marker).unwrap();
    assert_eq!(recorded.trim(), "harbor website post-service-start-website");
}

#[tokio::test]
async fn post_hook_is_skipped_when_the_deployment_fails() {
    let dir = TempDir::new().unwrap();
    let pre_marker = dir.path().join("pre-ran");
    let post_marker = dir.path().join("post-ran");
    write_hook(
        dir.path(),
        "pre-service-start-api",
        "record",
        &format!("touch {}", pre_marker.display()),
    );
    write_hook(
        dir.path(),
        "post-service-start-api",
        "record",
        &format!("touch {}", post_marker.display()),
    );
    let engine = FakeEngine::new(&compose())
        .with_replicas("api", 1)
        .failing_scale();
    let ctx = context_with(dir.path(), engine);
    let services = vec![ctx.service("api").await.unwrap()];

    let report = deploy::start_services(&ctx, &services, &DeployOptions::default(), &mut Diagnostics::default())
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(pre_marker.exists());
    assert!(!post_marker.exists());
}

#[tokio::test]
async fn failing_start_hook_aborts_the_whole_batch() {
    let dir = TempDir::new().unwrap();
    write_hook(dir.path(), "pre-start", "10-veto", "exit 1");
    let ctx = context(dir.path());
    let services = vec![ctx.service("website").await.unwrap()];

    let err = deploy::start_services(&ctx, &services, &DeployOptions::default(), &mut Diagnostics::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Hook(_)));
    assert!(ctx.runtime().calls().is_empty());
}
