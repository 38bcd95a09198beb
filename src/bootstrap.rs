//! Workspace bootstrapping: open a workspace, then make sure a stack exists.
//!
//! The sequence is strictly linear. A workspace that fails to open stops the
//! run before any stack request is made, and a stack request is sent exactly
//! once with no retry.

use crate::config::StackErrorPolicy;
use crate::context::ExecContext;
use crate::engine::{Engine, Workspace, WorkspaceOptions};
use crate::error::{BootstrapError, EngineError};
use crate::stack_ref::StackRef;

/// Open a workspace bound to `options.work_dir`.
pub fn open_workspace(
    engine: &dyn Engine,
    ctx: &ExecContext,
    options: &WorkspaceOptions,
) -> Result<Workspace, BootstrapError> {
    tracing::info!(work_dir = %options.work_dir.display(), "opening workspace");

    let workspace = engine
        .create_local_workspace(ctx, options)
        .map_err(|source| BootstrapError::Initialization {
            work_dir: options.work_dir.clone(),
            source,
        })?;

    tracing::info!(
        project = %workspace.project().name,
        runtime = workspace.project().runtime.name(),
        engine_version = ?workspace.engine_version().map(ToString::to_string),
        "workspace ready"
    );
    Ok(workspace)
}

/// Request creation of `stack` in `workspace`.
pub fn ensure_stack(
    engine: &dyn Engine,
    ctx: &ExecContext,
    workspace: &Workspace,
    stack: &StackRef,
) -> Result<(), BootstrapError> {
    if let Some(project) = stack.project() {
        if project != workspace.project().name {
            tracing::warn!(
                stack = %stack,
                project = %workspace.project().name,
                "stack reference names a different project than the workspace"
            );
        }
    }

    tracing::info!(stack = %stack, "creating stack");
    engine
        .create_stack(ctx, workspace, stack)
        .map_err(|source| BootstrapError::StackCreation {
            stack: stack.to_string(),
            source,
        })
}

/// What happened to the requested stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOutcome {
    Created,
    /// The stack already existed and was selected instead
    Selected,
}

/// Like `ensure_stack`, but a stack that already exists is selected rather
/// than reported as a failure.
pub fn ensure_or_select_stack(
    engine: &dyn Engine,
    ctx: &ExecContext,
    workspace: &Workspace,
    stack: &StackRef,
) -> Result<StackOutcome, BootstrapError> {
    match ensure_stack(engine, ctx, workspace, stack) {
        Ok(()) => Ok(StackOutcome::Created),
        Err(err) if matches!(err.engine_error(), EngineError::StackAlreadyExists(_)) => {
            tracing::info!(stack = %stack, "stack exists, selecting it");
            engine
                .select_stack(ctx, workspace, stack)
                .map_err(|source| BootstrapError::StackCreation {
                    stack: stack.to_string(),
                    source,
                })?;
            Ok(StackOutcome::Selected)
        }
        Err(err) => Err(err),
    }
}

/// How a bootstrap run ended, as far as the process exit status is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    InitializationFailed,
    StackFailed,
    /// Stack creation failed under the `continue` policy
    StackFailureIgnored,
    Cancelled,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success | RunStatus::StackFailureIgnored => 0,
            RunStatus::StackFailed => 1,
            RunStatus::InitializationFailed => 2,
            RunStatus::Cancelled => 130,
        }
    }
}

/// Map a failed step to a run status under `policy`.
pub fn failure_status(err: &BootstrapError, policy: StackErrorPolicy) -> RunStatus {
    if matches!(err.engine_error(), EngineError::Cancelled) {
        return RunStatus::Cancelled;
    }
    match err {
        BootstrapError::Initialization { .. } => RunStatus::InitializationFailed,
        BootstrapError::StackCreation { .. } => match policy {
            StackErrorPolicy::Fail => RunStatus::StackFailed,
            StackErrorPolicy::Continue => RunStatus::StackFailureIgnored,
        },
    }
}
