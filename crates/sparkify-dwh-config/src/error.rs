//! Error types for config store operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, validating or rewriting the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be rewritten
    #[error("Failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required key is absent from the file
    #[error("Missing key {key} in section [{section}]")]
    MissingKey { section: String, key: String },

    /// A value is present but unusable
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Settings failed validation
    #[error("{0}")]
    Invalid(String),
}

/// Result type alias for ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;
