//! Error types for catalog loading and warehouse execution.

use super::Stage;
use sparkify_dwh_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or rendering a query catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Statement '{name}' references unknown placeholder {{{{{placeholder}}}}}")]
    UnresolvedPlaceholder { name: String, placeholder: String },
}

/// Errors raised by a loader run
#[derive(Debug, Error)]
pub enum LoadError {
    /// Could not open the warehouse connection
    #[error("Failed to connect to {host}:{port}/{database}: {source}")]
    Connect {
        host: String,
        port: u16,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// A statement failed; statements committed before it stand
    #[error("{stage} statement #{index} '{name}' failed during {action}: {source}")]
    SqlExecution {
        stage: Stage,
        index: usize,
        name: String,
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for LoadError
pub type Result<T> = std::result::Result<T, LoadError>;
