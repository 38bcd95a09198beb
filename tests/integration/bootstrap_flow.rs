//! Workspace bootstrapping against the scripted pulumi CLI

use serial_test::serial;
use std::fs;

use autostack::bootstrap::{ensure_stack, open_workspace};
use autostack::context::ExecContext;
use autostack::engine::{Engine, PulumiCli, PulumiCliOptions, WorkspaceOptions};
use autostack::error::{BootstrapError, EngineError};
use autostack::stack_ref::StackRef;

use super::helpers::*;

fn stack() -> StackRef {
    StackRef::parse(STACK).unwrap()
}

#[test]
#[serial]
fn test_valid_project_creates_listed_stack() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    let engine = pulumi.engine();
    let ctx = ExecContext::background();

    let workspace =
        open_workspace(&engine, &ctx, &WorkspaceOptions::new(base.path().join("program")))
            .expect("workspace should open");
    assert_eq!(workspace.project().name, "autoproj");
    assert_eq!(
        workspace.engine_version().map(ToString::to_string),
        Some("3.100.0".to_string())
    );

    ensure_stack(&engine, &ctx, &workspace, &stack()).expect("stack should be created");

    let listed = engine.list_stacks(&ctx, &workspace).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].matches(&stack()));
    assert_eq!(
        pulumi.invocations(),
        vec![
            "version",
            "stack init org/autoproj/autostack --non-interactive",
            "stack ls --json",
        ]
    );
}

#[test]
#[serial]
fn test_directory_without_project_never_creates_stack() {
    let pulumi = FakePulumi::install();
    let base = tempfile::TempDir::new().unwrap();
    fs::create_dir(base.path().join("program")).unwrap();

    let err = open_workspace(
        &pulumi.engine(),
        &ExecContext::background(),
        &WorkspaceOptions::new(base.path().join("program")),
    )
    .unwrap_err();

    assert!(err.is_initialization());
    assert!(matches!(err.engine_error(), EngineError::ProjectNotFound(_)));
    assert!(pulumi.stack_inits().is_empty());
}

#[test]
#[serial]
fn test_missing_directory_fails_before_engine_is_invoked() {
    let pulumi = FakePulumi::install();
    let base = tempfile::TempDir::new().unwrap();

    let err = open_workspace(
        &pulumi.engine(),
        &ExecContext::background(),
        &WorkspaceOptions::new(base.path().join("program")),
    )
    .unwrap_err();

    assert!(matches!(err.engine_error(), EngineError::WorkDirNotFound(_)));
    assert!(pulumi.invocations().is_empty());
}

#[test]
#[serial]
fn test_second_creation_reports_already_exists() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    let options = WorkspaceOptions::new(base.path().join("program"));
    let ctx = ExecContext::background();

    // Separate engines stand in for two process runs sharing a backend
    let first = pulumi.engine();
    let workspace = open_workspace(&first, &ctx, &options).unwrap();
    ensure_stack(&first, &ctx, &workspace, &stack()).unwrap();

    let second = pulumi.engine();
    let workspace = open_workspace(&second, &ctx, &options).unwrap();
    let err = ensure_stack(&second, &ctx, &workspace, &stack()).unwrap_err();

    match err {
        BootstrapError::StackCreation { stack, source } => {
            assert_eq!(stack, STACK);
            match source {
                EngineError::StackAlreadyExists(name) => assert_eq!(name, STACK),
                other => panic!("expected StackAlreadyExists, got {other:?}"),
            }
        }
        other => panic!("expected stack creation error, got {other:?}"),
    }
    assert_eq!(pulumi.stacks(), vec![STACK]);
}

#[test]
#[serial]
fn test_outdated_cli_is_initialization_error() {
    let pulumi = FakePulumi::with_version("2.25.2");
    let base = project_base();

    let err = open_workspace(
        &pulumi.engine(),
        &ExecContext::background(),
        &WorkspaceOptions::new(base.path().join("program")),
    )
    .unwrap_err();

    assert!(matches!(
        err.engine_error(),
        EngineError::UnsupportedVersion { .. }
    ));
    assert!(pulumi.stack_inits().is_empty());
}

#[test]
#[serial]
fn test_skip_version_check() {
    let pulumi = FakePulumi::with_version("2.25.2");
    let base = project_base();
    let engine = PulumiCli::new(PulumiCliOptions {
        skip_version_check: true,
        ..pulumi.options()
    });

    let workspace = open_workspace(
        &engine,
        &ExecContext::background(),
        &WorkspaceOptions::new(base.path().join("program")),
    )
    .unwrap();

    assert!(workspace.engine_version().is_none());
    assert!(pulumi.invocations().is_empty());
}

#[test]
#[serial]
fn test_select_stack() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    let engine = pulumi.engine();
    let ctx = ExecContext::background();
    let workspace =
        open_workspace(&engine, &ctx, &WorkspaceOptions::new(base.path().join("program")))
            .unwrap();

    let missing = engine.select_stack(&ctx, &workspace, &stack()).unwrap_err();
    match missing {
        EngineError::StackNotFound(name) => assert_eq!(name, STACK),
        other => panic!("expected StackNotFound, got {other:?}"),
    }

    ensure_stack(&engine, &ctx, &workspace, &stack()).unwrap();
    engine.select_stack(&ctx, &workspace, &stack()).unwrap();
}

#[test]
#[serial]
fn test_engine_environment_is_passed_through() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    let mut options = pulumi.options();
    options
        .env
        .insert("PULUMI_BACKEND_URL".to_string(), "file://~".to_string());
    let engine = PulumiCli::new(options);

    open_workspace(
        &engine,
        &ExecContext::background(),
        &WorkspaceOptions::new(base.path().join("program")),
    )
    .unwrap();

    assert_eq!(pulumi.last_env(), "true file://~");
}

#[test]
#[serial]
fn test_cancelled_context_stops_stack_creation() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    let engine = pulumi.engine();
    let ctx = ExecContext::background();
    let workspace =
        open_workspace(&engine, &ctx, &WorkspaceOptions::new(base.path().join("program")))
            .unwrap();

    ctx.cancel();
    let err = ensure_stack(&engine, &ctx, &workspace, &stack()).unwrap_err();

    assert!(matches!(err.engine_error(), EngineError::Cancelled));
    assert!(pulumi.stack_inits().is_empty());
}
