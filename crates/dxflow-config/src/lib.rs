//! Configuration system for dxflow.
//!
//! Provides TOML-based configuration with:
//! - Pipeline inputs (site, reference sequence, subject-merge root, data root)
//! - Catalog naming and client tool location
//! - Registration layout and the metadata key list
//! - Poller cadence and worker pool sizes
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LoadedConfig, load_config_file, load_config_with_options,
    xdg_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
