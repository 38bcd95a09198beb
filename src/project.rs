//! Project definition discovery and parsing.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// Project file names, in lookup order.
pub const PROJECT_FILE_NAMES: &[&str] = &["Pulumi.yaml", "Pulumi.yml", "Pulumi.json"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectSettings {
    pub name: String,
    pub runtime: ProjectRuntime,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub backend: Option<ProjectBackend>,
}

/// `runtime: nodejs` or `runtime: { name: nodejs, options: {...} }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProjectRuntime {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        options: BTreeMap<String, serde_yaml::Value>,
    },
}

impl ProjectRuntime {
    pub fn name(&self) -> &str {
        match self {
            ProjectRuntime::Name(name) => name,
            ProjectRuntime::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectBackend {
    pub url: String,
}

/// First project file present in `dir`, if any.
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
    PROJECT_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Locate, read and validate the project definition in `dir`.
pub fn load_project(dir: &Path) -> EngineResult<(PathBuf, ProjectSettings)> {
    if !dir.is_dir() {
        return Err(EngineError::WorkDirNotFound(dir.to_path_buf()));
    }

    let path = find_project_file(dir).ok_or_else(|| EngineError::ProjectNotFound(dir.to_path_buf()))?;
    let content = fs::read_to_string(&path)?;
    let settings = parse_project(&path, &content)?;

    Ok((path, settings))
}

fn parse_project(path: &Path, content: &str) -> EngineResult<ProjectSettings> {
    let invalid = |message: String| EngineError::InvalidProject {
        path: path.to_path_buf(),
        message,
    };

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let settings: ProjectSettings = if is_json {
        serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?
    } else {
        serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?
    };

    if settings.name.trim().is_empty() {
        return Err(invalid("project name cannot be empty".to_string()));
    }
    if settings.runtime.name().trim().is_empty() {
        return Err(invalid("project runtime cannot be empty".to_string()));
    }

    Ok(settings)
}
