//! Error types for workspace bootstrapping.
//!
//! `EngineError` covers everything that can go wrong while talking to the
//! automation engine. `BootstrapError` classifies those failures by the step
//! that produced them, which is what the CLI uses to pick an exit status.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("working directory does not exist: {}", .0.display())]
    WorkDirNotFound(PathBuf),

    #[error("no project file (Pulumi.yaml, Pulumi.yml or Pulumi.json) found in {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("invalid project file {}: {message}", .path.display())]
    InvalidProject { path: PathBuf, message: String },

    #[error("pulumi CLI not found: {0}")]
    EngineNotFound(String),

    #[error("unsupported pulumi CLI version {found}: {reason}")]
    UnsupportedVersion { found: String, reason: String },

    #[error("stack '{0}' already exists")]
    StackAlreadyExists(String),

    #[error("stack '{0}' not found")]
    StackNotFound(String),

    #[error("`{command}` failed with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {:?}", .timeout)]
    Timeout { command: String, timeout: Duration },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("unexpected output from `{command}`: {message}")]
    Output { command: String, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

impl EngineError {
    /// True for failures caused by the context running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            EngineError::DeadlineExceeded | EngineError::Timeout { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to initialize workspace at {}", .work_dir.display())]
    Initialization {
        work_dir: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("failed to create stack '{stack}'")]
    StackCreation {
        stack: String,
        #[source]
        source: EngineError,
    },
}

impl BootstrapError {
    /// The underlying engine error, whichever step produced it.
    pub fn engine_error(&self) -> &EngineError {
        match self {
            BootstrapError::Initialization { source, .. } => source,
            BootstrapError::StackCreation { source, .. } => source,
        }
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, BootstrapError::Initialization { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("no stack reference given (pass one on the command line or set `stack` in autostack.toml)")]
    MissingStack,

    #[error("invalid stack reference '{reference}': {reason}")]
    InvalidStack { reference: String, reason: String },
}
