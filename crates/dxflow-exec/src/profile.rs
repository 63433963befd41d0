//! Environment profile for catalog client commands.
//!
//! The profile is a shell-style file of `KEY=VALUE` lines (optionally
//! prefixed with `export`). Every variable it defines is set on each
//! command the runner launches.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ExecError, ExecResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentProfile {
    vars: BTreeMap<String, String>,
}

impl EnvironmentProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a profile file. A missing file yields an empty profile.
    pub fn load(path: &Path) -> ExecResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Environment profile not found, using empty profile");
            return Ok(Self::empty());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ExecError::Profile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse profile text. Lines that are not assignments are ignored.
    pub fn parse(content: &str) -> Self {
        let mut vars = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                continue;
            }
            vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }
        Self { vars }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
