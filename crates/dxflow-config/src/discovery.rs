//! Where configuration comes from.
//!
//! Three layers are merged, each section of a later layer replacing the same
//! section of an earlier one:
//!
//! | layer    | path                                                  | if absent   |
//! |----------|-------------------------------------------------------|-------------|
//! | user     | `$DXFLOW_CONFIG_DIR/config.toml` or `<config>/dxflow` | skipped     |
//! | project  | `<project dir>/dxflow.toml`                           | skipped     |
//! | explicit | `--config <file>`                                     | error       |
//!
//! A user or project file that does not parse is reported as a warning and
//! left out; an explicit file must load.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ConfigError, DxflowConfig, Result};

const USER_FILE: &str = "config.toml";
const PROJECT_FILE: &str = "dxflow.toml";
const CONFIG_DIR_ENV: &str = "DXFLOW_CONFIG_DIR";

/// The layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
    Explicit,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::User => f.write_str("user"),
            ConfigLayer::Project => f.write_str("project"),
            ConfigLayer::Explicit => f.write_str("explicit"),
        }
    }
}

/// One file that was considered while loading.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub loaded: bool,
}

/// Merged configuration plus what went into it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DxflowConfig,
    /// Lowest precedence first.
    pub sources: Vec<ConfigSource>,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> impl Iterator<Item = &ConfigSource> {
        self.sources.iter().filter(|s| s.loaded)
    }
}

/// Load and merge the user, project and explicit layers.
///
/// `config_dir` replaces the user config directory lookup; `project_dir`
/// defaults to the working directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: DxflowConfig::default(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    let user_dir = config_dir.map(Path::to_path_buf).or_else(xdg_config_dir);
    if let Some(dir) = user_dir {
        loaded.discover(ConfigLayer::User, dir.join(USER_FILE));
    }
    let project_dir = project_dir.unwrap_or_else(|| Path::new("."));
    loaded.discover(ConfigLayer::Project, project_dir.join(PROJECT_FILE));

    if let Some(path) = explicit {
        loaded.config.merge(load_config_file(path)?);
        loaded.sources.push(ConfigSource {
            layer: ConfigLayer::Explicit,
            path: path.to_path_buf(),
            loaded: true,
        });
    }

    Ok(loaded)
}

impl LoadedConfig {
    fn discover(&mut self, layer: ConfigLayer, path: PathBuf) {
        let loaded = path.is_file()
            && match load_config_file(&path) {
                Ok(config) => {
                    self.config.merge(config);
                    true
                }
                Err(e) => {
                    self.warnings
                        .push(format!("Ignoring {layer} config {}: {e}", path.display()));
                    false
                }
            };
        self.sources.push(ConfigSource {
            layer,
            path,
            loaded,
        });
    }
}

/// Parse one config file.
pub fn load_config_file(path: &Path) -> Result<DxflowConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    DxflowConfig::from_toml(&contents)
}

/// The user config directory: `DXFLOW_CONFIG_DIR` when set, else the
/// platform config dir joined with `dxflow`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("dxflow")),
    }
}
