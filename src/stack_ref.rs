//! Stack references of the form `org/project/stack`.
//!
//! A reference is kept exactly as given. The only local check is that it is
//! not blank; its format and whether the organization or project exist are
//! decided by the engine when the stack is created, and a rejection there is
//! a stack creation failure like any other.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const MAX_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackRef {
    raw: String,
}

impl StackRef {
    pub fn parse(reference: &str) -> Result<Self, ConfigError> {
        if reference.trim().is_empty() {
            return Err(ConfigError::InvalidStack {
                reference: reference.to_string(),
                reason: "reference cannot be empty".to_string(),
            });
        }

        Ok(Self {
            raw: reference.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn segments(&self) -> Vec<&str> {
        self.raw.split('/').collect()
    }

    /// The final segment, the stack's own name.
    pub fn name(&self) -> &str {
        self.raw.rsplit('/').next().unwrap_or(&self.raw)
    }

    /// Organization segment, present for `org/stack` and `org/project/stack`.
    pub fn organization(&self) -> Option<&str> {
        let segments = self.segments();
        (segments.len() >= 2).then(|| segments[0])
    }

    /// Project segment, present only for fully qualified references.
    pub fn project(&self) -> Option<&str> {
        let segments = self.segments();
        (segments.len() == MAX_SEGMENTS).then(|| segments[1])
    }

    pub fn is_fully_qualified(&self) -> bool {
        self.segments().len() == MAX_SEGMENTS
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StackRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Clap value parser for stack reference arguments.
pub fn clap_stack_validator(s: &str) -> Result<String, String> {
    StackRef::parse(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}
