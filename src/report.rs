//! User-facing output on stdout.

use colored::Colorize;
use std::error::Error;
use std::path::Path;

use crate::engine::{StackSummary, Workspace};
use crate::error::BootstrapError;
use crate::stack_ref::StackRef;

pub fn print_header() {
    println!();
    println!("{}", "╭──────────────────────────────────────╮".cyan());
    println!(
        "{}",
        "│       Bootstrapping workspace...     │".cyan().bold()
    );
    println!("{}", "╰──────────────────────────────────────╯".cyan());
}

pub fn workspace_opened(workspace: &Workspace, base_dir: &Path) {
    println!(
        "  {} Workspace opened {}",
        "✓".green().bold(),
        display_path(workspace.work_dir(), base_dir).dimmed()
    );
    println!(
        "    {} {} ({})",
        "project".dimmed(),
        workspace.project().name.bold(),
        workspace.project().runtime.name()
    );
    if let Some(version) = workspace.engine_version() {
        println!("    {} pulumi v{}", "engine".dimmed(), version);
    }
}

pub fn stack_created(stack: &StackRef) {
    println!(
        "  {} Stack created {}",
        "✓".green().bold(),
        stack.as_str().bold()
    );
}

pub fn stack_selected(stack: &StackRef) {
    println!(
        "  {} Stack selected {} {}",
        "✓".green().bold(),
        stack.as_str().bold(),
        "(already existed)".dimmed()
    );
}

/// Report a failed bootstrap step, including the full cause chain.
pub fn bootstrap_failed(err: &BootstrapError) {
    let headline = match err {
        BootstrapError::Initialization { .. } => "Failed to initialize workspace",
        BootstrapError::StackCreation { .. } => "Failed to create stack",
    };
    println!("  {} {}", "✗".red().bold(), headline.red().bold());
    for cause in cause_chain(err) {
        println!("    {} {}", "→".dimmed(), cause);
    }
}

pub fn stack_failure_ignored() {
    println!(
        "  {} Continuing: stack errors are configured as non-fatal",
        "!".yellow().bold()
    );
}

pub fn print_stacks(stacks: &[StackSummary]) {
    if stacks.is_empty() {
        println!("{}", "No stacks in this workspace".dimmed());
        return;
    }

    for stack in stacks {
        let marker = if stack.current { "*".green().bold() } else { " ".normal() };
        let mut line = format!("{marker} {}", stack.name.bold());
        if let Some(count) = stack.resource_count {
            line.push_str(&format!("  {} resources", count).dimmed().to_string());
        }
        if stack.update_in_progress {
            line.push_str(&format!("  {}", "update in progress".yellow()));
        }
        println!("{line}");
    }
}

pub fn print_workspace(workspace: &Workspace) {
    let project = workspace.project();
    println!("{} {}", "Project:".bold(), project.name);
    println!("{} {}", "Runtime:".bold(), project.runtime.name());
    if let Some(description) = &project.description {
        println!("{} {}", "Description:".bold(), description);
    }
    if let Some(backend) = &project.backend {
        println!("{} {}", "Backend:".bold(), backend.url);
    }
    println!(
        "{} {}",
        "Project file:".bold(),
        workspace.project_file().display()
    );
    match workspace.engine_version() {
        Some(version) => println!("{} pulumi v{}", "Engine:".bold(), version),
        None => println!("{} pulumi (version not checked)", "Engine:".bold()),
    }
}

/// Display a path relative to `base_dir`, or as-is if it lies outside.
pub fn display_path(path: &Path, base_dir: &Path) -> String {
    let base = base_dir
        .canonicalize()
        .unwrap_or_else(|_| base_dir.to_path_buf());
    path.strip_prefix(&base)
        .map(|relative| relative.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

fn cause_chain(err: &dyn Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes
}
