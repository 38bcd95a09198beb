use anyhow::{Context, Result};
use autostack::bootstrap::{
    ensure_or_select_stack, ensure_stack, failure_status, open_workspace, RunStatus, StackOutcome,
};
use autostack::config::{Config, Overrides, StackErrorPolicy};
use autostack::context::ExecContext;
use autostack::engine::{Engine, PulumiCli, Workspace, WorkspaceOptions};
use autostack::report;
use colored::Colorize;

use super::types::{Commands, GlobalArgs};

pub fn dispatch(global: GlobalArgs, command: Commands, ctx: &ExecContext) -> Result<RunStatus> {
    let mut overrides = Overrides {
        project_dir: global.project_dir,
        binary: global.pulumi,
        timeout_secs: global.timeout,
        ..Default::default()
    };
    if let Commands::Init {
        stack,
        on_stack_error,
        select_existing,
    } = &command
    {
        overrides.stack = stack.clone();
        overrides.on_stack_error = *on_stack_error;
        overrides.select_existing = select_existing.then_some(true);
    }

    let config = match Config::load(&global.base_dir, global.config.as_deref()) {
        Ok(config) => config.apply(overrides),
        Err(e) => return Ok(config_failed(&e)),
    };

    match command {
        Commands::Init { .. } => init(&config, ctx),
        Commands::Ls => list(&config, ctx),
        Commands::Check => check(&config, ctx),
    }
}

fn init(config: &Config, ctx: &ExecContext) -> Result<RunStatus> {
    let stack = match config.stack_ref() {
        Ok(stack) => stack,
        Err(e) => return Ok(config_failed(&e)),
    };
    let engine = PulumiCli::new(config.pulumi_options());

    report::print_header();

    let workspace = match open(&engine, config, ctx) {
        Ok(workspace) => workspace,
        Err(status) => return Ok(status),
    };
    report::workspace_opened(&workspace, &config.base_dir);

    let step = step_context(config, ctx);
    let outcome = if config.select_existing {
        ensure_or_select_stack(&engine, &step, &workspace, &stack)
    } else {
        ensure_stack(&engine, &step, &workspace, &stack).map(|()| StackOutcome::Created)
    };

    match outcome {
        Ok(StackOutcome::Created) => {
            report::stack_created(&stack);
            Ok(RunStatus::Success)
        }
        Ok(StackOutcome::Selected) => {
            report::stack_selected(&stack);
            Ok(RunStatus::Success)
        }
        Err(err) => {
            report::bootstrap_failed(&err);
            let status = settle(failure_status(&err, config.on_stack_error), ctx);
            if status == RunStatus::StackFailureIgnored {
                report::stack_failure_ignored();
            }
            Ok(status)
        }
    }
}

fn list(config: &Config, ctx: &ExecContext) -> Result<RunStatus> {
    let engine = PulumiCli::new(config.pulumi_options());
    let workspace = match open(&engine, config, ctx) {
        Ok(workspace) => workspace,
        Err(status) => return Ok(status),
    };

    let stacks = engine
        .list_stacks(&step_context(config, ctx), &workspace)
        .context("Failed to list stacks")?;
    report::print_stacks(&stacks);
    Ok(RunStatus::Success)
}

fn check(config: &Config, ctx: &ExecContext) -> Result<RunStatus> {
    let engine = PulumiCli::new(config.pulumi_options());
    let workspace = match open(&engine, config, ctx) {
        Ok(workspace) => workspace,
        Err(status) => return Ok(status),
    };

    report::print_workspace(&workspace);
    Ok(RunStatus::Success)
}

/// Open the configured workspace, reporting a failure and its run status.
fn open(engine: &dyn Engine, config: &Config, ctx: &ExecContext) -> Result<Workspace, RunStatus> {
    let options = WorkspaceOptions::new(config.work_dir());
    open_workspace(engine, &step_context(config, ctx), &options).map_err(|err| {
        report::bootstrap_failed(&err);
        // Initialization failures are fatal whatever the stack policy says
        settle(failure_status(&err, StackErrorPolicy::Fail), ctx)
    })
}

/// An interrupted run is cancelled even if the engine reported something else.
fn settle(status: RunStatus, ctx: &ExecContext) -> RunStatus {
    if ctx.is_cancelled() {
        RunStatus::Cancelled
    } else {
        status
    }
}

/// Each engine step gets its own deadline under the root context.
fn step_context(config: &Config, ctx: &ExecContext) -> ExecContext {
    match config.engine_timeout() {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx.clone(),
    }
}

fn config_failed(err: &dyn std::error::Error) -> RunStatus {
    println!("  {} {}", "✗".red().bold(), "Invalid configuration".red().bold());
    let mut cause: Option<&dyn std::error::Error> = Some(err);
    while let Some(current) = cause {
        println!("    {} {}", "→".dimmed(), current);
        cause = current.source();
    }
    RunStatus::InitializationFailed
}
