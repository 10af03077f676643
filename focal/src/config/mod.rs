//! Layered configuration.
//!
//! [`FocalConfig`] has one section per subsystem: `logging`, `retry`,
//! `store`, `relevance` and `ranking`. [`ConfigLoader`] stacks serialized
//! defaults, at most one config file and `FOCAL_` environment variables, and
//! every way of producing a config ends in [`validate_config`].

mod builder;
mod loader;
mod models;
mod validation;

use std::path::{Path, PathBuf};

pub use builder::ConfigBuilder;
pub use loader::ConfigLoader;
pub use models::*;
pub use validation::validate_config;

/// Prefix of environment overrides; `__` separates section and key
pub const ENV_PREFIX: &str = "FOCAL_";

/// Accepted config file extensions, in lookup order
pub const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Config files looked up under `dir`: every `focal.<ext>`, then every
/// `.focal/config.<ext>`.
pub fn config_candidates(dir: &Path) -> Vec<PathBuf> {
    let flat = CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("focal.{}", ext)));
    let nested = CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(".focal").join(format!("config.{}", ext)));
    flat.chain(nested).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A layer could not be deserialized into [`FocalConfig`]
    #[error("cannot parse configuration: {0}")]
    Parse(String),

    #[error("invalid {section} settings: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// The section an `Invalid` error refers to
    pub fn section(&self) -> Option<&'static str> {
        match self {
            ConfigError::Invalid { section, .. } => Some(section),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
