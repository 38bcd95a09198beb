//! Configuration: an optional `autostack.toml` merged with command-line overrides.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::PulumiCliOptions;
use crate::error::ConfigError;
use crate::stack_ref::StackRef;

pub const CONFIG_FILE_NAME: &str = "autostack.toml";

/// Project subdirectory used when nothing else is configured
pub const DEFAULT_PROJECT_DIR: &str = "program";

pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 300;

/// What to do when the stack cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StackErrorPolicy {
    /// Report the failure and exit non-zero
    #[default]
    Fail,
    /// Report the failure and exit successfully
    Continue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    stack: Option<String>,
    project_dir: Option<PathBuf>,
    on_stack_error: Option<StackErrorPolicy>,
    select_existing: Option<bool>,
    #[serde(default)]
    engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    pub binary: String,
    /// Per-invocation deadline in seconds; 0 disables it
    pub timeout_secs: u64,
    pub skip_version_check: bool,
    pub env: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "pulumi".to_string(),
            timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
            skip_version_check: false,
            env: BTreeMap::new(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub stack: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub binary: Option<String>,
    pub timeout_secs: Option<u64>,
    pub on_stack_error: Option<StackErrorPolicy>,
    pub select_existing: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub project_dir: PathBuf,
    pub stack: Option<String>,
    pub on_stack_error: StackErrorPolicy,
    /// Select the stack instead of failing when it already exists
    pub select_existing: bool,
    pub engine: EngineConfig,
}

impl Config {
    /// Defaults rooted at `base_dir`, ignoring any config file.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            stack: None,
            on_stack_error: StackErrorPolicy::default(),
            select_existing: false,
            engine: EngineConfig::default(),
        }
    }

    /// Load configuration for `base_dir`.
    ///
    /// An explicit path must exist. Without one, `autostack.toml` in
    /// `base_dir` is read if present.
    pub fn load(base_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Some(base_dir.join(CONFIG_FILE_NAME)).filter(|path| path.is_file()),
        };

        let file = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                read_file_config(&path)?
            }
            None => FileConfig::default(),
        };

        let mut config = Self::new(base_dir);
        if let Some(project_dir) = file.project_dir {
            config.project_dir = project_dir;
        }
        config.stack = file.stack;
        config.on_stack_error = file.on_stack_error.unwrap_or_default();
        config.select_existing = file.select_existing.unwrap_or(false);
        config.engine = file.engine;
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(stack) = overrides.stack {
            self.stack = Some(stack);
        }
        if let Some(project_dir) = overrides.project_dir {
            self.project_dir = project_dir;
        }
        if let Some(binary) = overrides.binary {
            self.engine.binary = binary;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.engine.timeout_secs = timeout_secs;
        }
        if let Some(policy) = overrides.on_stack_error {
            self.on_stack_error = policy;
        }
        if let Some(select_existing) = overrides.select_existing {
            self.select_existing = select_existing;
        }
        self
    }

    /// Directory holding the project definition.
    pub fn work_dir(&self) -> PathBuf {
        self.base_dir.join(&self.project_dir)
    }

    pub fn stack_ref(&self) -> Result<StackRef, ConfigError> {
        let raw = self.stack.as_deref().ok_or(ConfigError::MissingStack)?;
        StackRef::parse(raw)
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        (self.engine.timeout_secs > 0).then(|| Duration::from_secs(self.engine.timeout_secs))
    }

    pub fn pulumi_options(&self) -> PulumiCliOptions {
        PulumiCliOptions {
            binary: self.engine.binary.clone(),
            env: self.engine.env.clone(),
            skip_version_check: self.engine.skip_version_check,
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}
