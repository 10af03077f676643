//! Configuration validation utilities.
//!
//! Each section validates itself; failures become [`ConfigError::Invalid`]
//! tagged with the section name.

use super::ConfigError;
use super::models::*;

/// Validate the entire configuration.
pub fn validate_config(config: &FocalConfig) -> Result<(), ConfigError> {
    validate_logging_config(&config.logging)?;
    section("retry", config.retry.validate())?;
    section("store", config.store.validate())?;
    section("relevance", config.relevance.validate())?;
    section("ranking", config.ranking.validate())?;

    Ok(())
}

fn section(name: &'static str, result: Result<(), String>) -> Result<(), ConfigError> {
    result.map_err(|message| ConfigError::Invalid {
        section: name,
        message,
    })
}

/// Validate logging configuration.
fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if let Some(file) = &config.file {
        if file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                section: "logging",
                message: "log file path cannot be empty".to_string(),
            });
        }
    }

    if !config.stdout && config.file.is_none() {
        return Err(ConfigError::Invalid {
            section: "logging",
            message: "at least one of stdout or file must be enabled".to_string(),
        });
    }

    Ok(())
}
