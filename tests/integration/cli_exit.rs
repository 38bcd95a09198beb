//! Exit status and output of the `autostack` binary

use serial_test::serial;
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::helpers::*;

fn autostack(base: &Path, pulumi: &FakePulumi, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autostack"))
        .arg("--dir")
        .arg(base)
        .arg("--pulumi")
        .arg(&pulumi.binary)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run autostack")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
#[serial]
fn test_init_succeeds_with_zero_exit() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(base.path(), &pulumi, &["init", STACK]);

    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("Stack created"));
    assert!(!stdout(&output).contains("Failed to create stack"));
    assert_eq!(pulumi.stacks(), vec![STACK]);
}

#[test]
#[serial]
fn test_second_run_fails_under_default_policy() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let first = autostack(base.path(), &pulumi, &["init", STACK]);
    assert_eq!(first.status.code(), Some(0));

    let second = autostack(base.path(), &pulumi, &["init", STACK]);
    assert_eq!(second.status.code(), Some(1));
    let out = stdout(&second);
    assert!(out.contains("Failed to create stack"), "stdout: {out}");
    assert!(out.contains("already exists"), "stdout: {out}");
}

#[test]
#[serial]
fn test_continue_policy_reports_and_exits_zero() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    autostack(base.path(), &pulumi, &["init", STACK]);
    let second = autostack(
        base.path(),
        &pulumi,
        &["init", STACK, "--on-stack-error", "continue"],
    );

    assert_eq!(second.status.code(), Some(0));
    assert!(stdout(&second).contains("Failed to create stack"));
}

#[test]
#[serial]
fn test_select_existing_adopts_stack_on_second_run() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    autostack(base.path(), &pulumi, &["init", STACK]);
    let second = autostack(base.path(), &pulumi, &["init", STACK, "--select-existing"]);

    assert_eq!(second.status.code(), Some(0), "stdout: {}", stdout(&second));
    let out = stdout(&second);
    assert!(out.contains("Stack selected"), "stdout: {out}");
    assert!(!out.contains("Failed to create stack"), "stdout: {out}");
    assert!(pulumi
        .invocations()
        .contains(&"stack select org/autoproj/autostack --non-interactive".to_string()));
    assert_eq!(pulumi.stacks(), vec![STACK]);
}

#[test]
#[serial]
fn test_missing_project_dir_exits_before_stack_creation() {
    let pulumi = FakePulumi::install();
    let base = tempfile::TempDir::new().unwrap();

    let output = autostack(base.path(), &pulumi, &["init", STACK]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("Failed to initialize workspace"));
    assert!(pulumi.stack_inits().is_empty());
}

#[test]
#[serial]
fn test_stack_from_config_file() {
    let pulumi = FakePulumi::install();
    let base = project_base();
    fs::write(
        base.path().join("autostack.toml"),
        format!("stack = \"{STACK}\"\non_stack_error = \"continue\"\n"),
    )
    .unwrap();

    let output = autostack(base.path(), &pulumi, &["init"]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(pulumi.stacks(), vec![STACK]);
}

#[test]
#[serial]
fn test_missing_stack_reference_is_configuration_error() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(base.path(), &pulumi, &["init"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("no stack reference given"));
    assert!(pulumi.invocations().is_empty());
}

#[test]
#[serial]
fn test_ls_prints_created_stacks() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    autostack(base.path(), &pulumi, &["init", STACK]);
    let output = autostack(base.path(), &pulumi, &["ls"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains(STACK));
}

#[test]
#[serial]
fn test_check_shows_project() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(base.path(), &pulumi, &["check"]);

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("autoproj"), "stdout: {out}");
    assert!(out.contains("3.100.0"), "stdout: {out}");
    assert!(pulumi.stack_inits().is_empty());
}

#[test]
#[serial]
fn test_malformed_stack_reference_is_stack_creation_failure() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(base.path(), &pulumi, &["init", "a/b/c/d"]);

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("Failed to create stack"), "stdout: {out}");
    assert!(out.contains("invalid stack reference"), "stdout: {out}");
    assert_eq!(
        pulumi.stack_inits(),
        vec!["stack init a/b/c/d --non-interactive"]
    );
    assert!(pulumi.stacks().is_empty());
}

#[test]
#[serial]
fn test_malformed_stack_reference_follows_continue_policy() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(
        base.path(),
        &pulumi,
        &["init", "a/b/c/d", "--on-stack-error", "continue"],
    );

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Failed to create stack"));
    assert_eq!(pulumi.stack_inits().len(), 1);
}

#[test]
#[serial]
fn test_blank_stack_argument_rejected_by_parser() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = autostack(base.path(), &pulumi, &["init", ""]);

    assert_eq!(output.status.code(), Some(2));
    assert!(pulumi.invocations().is_empty());
}

/// Start `autostack init`, wait for the hanging `stack init`, then send SIGINT.
fn interrupt_init(base: &Path, pulumi: &FakePulumi, extra: &[&str]) -> Output {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    pulumi.hang_on_stack_init();
    let child = Command::new(env!("CARGO_BIN_EXE_autostack"))
        .arg("--dir")
        .arg(base)
        .arg("--pulumi")
        .arg(&pulumi.binary)
        .args(["init", STACK])
        .args(extra)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start autostack");

    let started = Instant::now();
    while pulumi.stack_inits().is_empty() {
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "stack init was never invoked"
        );
        thread::sleep(Duration::from_millis(20));
    }

    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).expect("Failed to send SIGINT");
    child.wait_with_output().expect("Failed to wait for autostack")
}

#[test]
#[serial]
fn test_interrupt_exits_130_under_fail_policy() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let started = Instant::now();
    let output = interrupt_init(base.path(), &pulumi, &[]);

    assert_eq!(output.status.code(), Some(130), "stdout: {}", stdout(&output));
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(pulumi.stacks().is_empty());
}

#[test]
#[serial]
fn test_interrupt_exits_130_under_continue_policy() {
    let pulumi = FakePulumi::install();
    let base = project_base();

    let output = interrupt_init(base.path(), &pulumi, &["--on-stack-error", "continue"]);

    assert_eq!(output.status.code(), Some(130), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("operation cancelled"));
}
