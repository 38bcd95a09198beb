//! The automation engine seam.
//!
//! `Engine` is the capability the bootstrapper consumes: open a workspace
//! bound to a local project directory, then manage stacks inside it.
//! `PulumiCli` drives the real `pulumi` binary; tests provide their own
//! implementations.

mod pulumi;

pub use pulumi::{PulumiCli, PulumiCliOptions, MINIMUM_PULUMI_VERSION};

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::context::ExecContext;
use crate::error::EngineResult;
use crate::project::{load_project, ProjectSettings};
use crate::stack_ref::StackRef;

/// Options for opening a local workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    pub work_dir: PathBuf,
}

impl WorkspaceOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

/// A workspace bound to one project directory. Immutable once opened.
#[derive(Debug, Clone)]
pub struct Workspace {
    work_dir: PathBuf,
    project_file: PathBuf,
    project: ProjectSettings,
    engine_version: Option<semver::Version>,
}

impl Workspace {
    /// Load the project in `options.work_dir` and bind a workspace to it.
    ///
    /// Engines call this after their own preflight checks. The working
    /// directory is canonicalized so later commands are independent of the
    /// process's current directory.
    pub fn load(
        options: &WorkspaceOptions,
        engine_version: Option<semver::Version>,
    ) -> EngineResult<Self> {
        let (project_file, project) = load_project(&options.work_dir)?;
        let work_dir = options.work_dir.canonicalize()?;
        let project_file = work_dir.join(project_file.file_name().unwrap_or_default());

        Ok(Self {
            work_dir,
            project_file,
            project,
            engine_version,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn project_file(&self) -> &Path {
        &self.project_file
    }

    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    pub fn engine_version(&self) -> Option<&semver::Version> {
        self.engine_version.as_ref()
    }
}

/// One entry of a workspace's stack listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSummary {
    pub name: String,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub update_in_progress: bool,
    #[serde(default)]
    pub resource_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl StackSummary {
    /// Whether this entry is the stack `stack` refers to.
    ///
    /// Listings may print fully qualified names or bare ones depending on
    /// the backend, so a bare listing name matches on the final segment.
    pub fn matches(&self, stack: &StackRef) -> bool {
        self.name == stack.as_str() || (!self.name.contains('/') && self.name == stack.name())
    }
}

pub trait Engine {
    /// Open a workspace bound to a local project directory.
    fn create_local_workspace(
        &self,
        ctx: &ExecContext,
        options: &WorkspaceOptions,
    ) -> EngineResult<Workspace>;

    /// Create a new stack. Fails if the stack already exists.
    fn create_stack(
        &self,
        ctx: &ExecContext,
        workspace: &Workspace,
        stack: &StackRef,
    ) -> EngineResult<()>;

    /// Make an existing stack the workspace's current stack.
    fn select_stack(
        &self,
        ctx: &ExecContext,
        workspace: &Workspace,
        stack: &StackRef,
    ) -> EngineResult<()>;

    fn list_stacks(&self, ctx: &ExecContext, workspace: &Workspace)
        -> EngineResult<Vec<StackSummary>>;
}
