//! `Engine` implementation that drives the `pulumi` CLI.

use regex::Regex;
use semver::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};

use super::{Engine, StackSummary, Workspace, WorkspaceOptions};
use crate::context::ExecContext;
use crate::error::{EngineError, EngineResult};
use crate::process::{run_command, CommandOutput, CommandSpec};
use crate::stack_ref::StackRef;

/// Oldest CLI release that supports the commands issued here.
pub const MINIMUM_PULUMI_VERSION: Version = Version::new(3, 2, 0);

static STACK_EXISTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"stack '.*' already exists").expect("Invalid regex pattern"));

static STACK_NOT_FOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"no stack named .* found").expect("Invalid regex pattern"));

#[derive(Debug, Clone)]
pub struct PulumiCliOptions {
    /// Binary name looked up on PATH, or an explicit path.
    pub binary: String,
    /// Extra environment for every CLI invocation.
    pub env: BTreeMap<String, String>,
    pub skip_version_check: bool,
}

impl Default for PulumiCliOptions {
    fn default() -> Self {
        Self {
            binary: "pulumi".to_string(),
            env: BTreeMap::new(),
            skip_version_check: false,
        }
    }
}

#[derive(Debug)]
pub struct PulumiCli {
    options: PulumiCliOptions,
    resolved: OnceLock<PathBuf>,
}

impl PulumiCli {
    pub fn new(options: PulumiCliOptions) -> Self {
        Self {
            options,
            resolved: OnceLock::new(),
        }
    }

    /// Path of the CLI binary, resolved on first use.
    pub fn binary(&self) -> EngineResult<&Path> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.as_path());
        }
        let path = resolve_binary(&self.options.binary)?;
        tracing::debug!(binary = %path.display(), "resolved pulumi CLI");
        Ok(self.resolved.get_or_init(|| path).as_path())
    }

    /// Version reported by `pulumi version`.
    pub fn version(&self, ctx: &ExecContext, dir: &Path) -> EngineResult<Version> {
        let output = self.run(ctx, dir, &["version"])?;
        parse_version(&output.stdout)
    }

    fn command(&self, dir: &Path, args: &[&str]) -> EngineResult<CommandSpec> {
        let mut spec = CommandSpec::new(self.binary()?)
            .args(args.iter().copied())
            .current_dir(dir)
            .env("PULUMI_SKIP_UPDATE_CHECK", "true");
        for (key, value) in &self.options.env {
            spec = spec.env(key, value);
        }
        Ok(spec)
    }

    /// Run a CLI command and turn a non-zero exit into a classified error.
    fn run(&self, ctx: &ExecContext, dir: &Path, args: &[&str]) -> EngineResult<CommandOutput> {
        let spec = self.command(dir, args)?;
        let output = run_command(ctx, &spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(classify_failure(&spec.display(), &output))
        }
    }
}

impl Engine for PulumiCli {
    fn create_local_workspace(
        &self,
        ctx: &ExecContext,
        options: &WorkspaceOptions,
    ) -> EngineResult<Workspace> {
        if !options.work_dir.is_dir() {
            return Err(EngineError::WorkDirNotFound(options.work_dir.clone()));
        }
        self.binary()?;

        let version = if self.options.skip_version_check {
            tracing::debug!("skipping pulumi CLI version check");
            None
        } else {
            let version = self.version(ctx, &options.work_dir)?;
            check_version(&version)?;
            Some(version)
        };

        Workspace::load(options, version)
    }

    fn create_stack(
        &self,
        ctx: &ExecContext,
        workspace: &Workspace,
        stack: &StackRef,
    ) -> EngineResult<()> {
        let output = self.run(
            ctx,
            workspace.work_dir(),
            &["stack", "init", stack.as_str(), "--non-interactive"],
        )?;
        tracing::info!(
            stack = %stack,
            duration_ms = output.duration.as_millis() as u64,
            "stack created"
        );
        Ok(())
    }

    fn select_stack(
        &self,
        ctx: &ExecContext,
        workspace: &Workspace,
        stack: &StackRef,
    ) -> EngineResult<()> {
        self.run(
            ctx,
            workspace.work_dir(),
            &["stack", "select", stack.as_str(), "--non-interactive"],
        )?;
        tracing::info!(stack = %stack, "stack selected");
        Ok(())
    }

    fn list_stacks(
        &self,
        ctx: &ExecContext,
        workspace: &Workspace,
    ) -> EngineResult<Vec<StackSummary>> {
        let output = self.run(ctx, workspace.work_dir(), &["stack", "ls", "--json"])?;
        serde_json::from_str(output.stdout.trim()).map_err(|e| EngineError::Output {
            command: "pulumi stack ls --json".to_string(),
            message: e.to_string(),
        })
    }
}

fn resolve_binary(binary: &str) -> EngineResult<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(EngineError::EngineNotFound(format!(
                "{} does not exist",
                candidate.display()
            )))
        };
    }

    if let Ok(path) = which::which(binary) {
        return Ok(path);
    }

    // Default location used by the official installer
    if let Some(home) = dirs::home_dir() {
        let installed = home.join(".pulumi").join("bin").join(binary);
        if installed.is_file() {
            return Ok(installed);
        }
    }

    Err(EngineError::EngineNotFound(format!(
        "'{binary}' is not on PATH or in ~/.pulumi/bin"
    )))
}

fn parse_version(stdout: &str) -> EngineResult<Version> {
    let raw = stdout.trim();
    Version::parse(raw.trim_start_matches('v')).map_err(|e| EngineError::Output {
        command: "pulumi version".to_string(),
        message: format!("cannot parse version '{raw}': {e}"),
    })
}

fn check_version(found: &Version) -> EngineResult<()> {
    let release = Version::new(found.major, found.minor, found.patch);
    if release < MINIMUM_PULUMI_VERSION {
        return Err(EngineError::UnsupportedVersion {
            found: found.to_string(),
            reason: format!("minimum supported version is {MINIMUM_PULUMI_VERSION}"),
        });
    }
    if found.major > MINIMUM_PULUMI_VERSION.major {
        return Err(EngineError::UnsupportedVersion {
            found: found.to_string(),
            reason: format!(
                "major version {} is newer than the supported major version {}",
                found.major, MINIMUM_PULUMI_VERSION.major
            ),
        });
    }
    Ok(())
}

fn classify_failure(command: &str, output: &CommandOutput) -> EngineError {
    let stderr = output.stderr.trim();

    if let Some(found) = STACK_EXISTS_RE.find(stderr) {
        return EngineError::StackAlreadyExists(quoted_name(found.as_str()));
    }
    if let Some(found) = STACK_NOT_FOUND_RE.find(stderr) {
        let name = found
            .as_str()
            .trim_start_matches("no stack named ")
            .trim_end_matches(" found")
            .trim_matches('\'')
            .to_string();
        return EngineError::StackNotFound(name);
    }

    EngineError::CommandFailed {
        command: command.to_string(),
        code: output.exit_code,
        stderr: stderr.to_string(),
    }
}

/// Text between the first pair of single quotes.
fn quoted_name(message: &str) -> String {
    message
        .split('\'')
        .nth(1)
        .unwrap_or(message)
        .to_string()
}
