//! Error types for provisioning operations.

use super::ClusterStatus;
use sparkify_dwh_config::ConfigError;
use thiserror::Error;

/// Errors raised by identity and cluster provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The resource already exists (non-fatal for create requests)
    #[error("{resource} '{name}' already exists")]
    Conflict { resource: &'static str, name: String },

    /// The resource does not exist
    #[error("{resource} '{name}' not found")]
    NotFound { resource: &'static str, name: String },

    /// The endpoint was requested before the cluster became available
    #[error("Cluster '{identifier}' is {status}; the endpoint is only available once the cluster is available")]
    NotAvailable {
        identifier: String,
        status: ClusterStatus,
    },

    /// Any other provider failure
    #[error("{operation} failed: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    /// Config store read or write failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProvisionError {
    /// Wrap a provider SDK error with the full error chain as its message
    pub(crate) fn provider<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provider {
            operation,
            message: aws_sdk_iam::error::DisplayErrorContext(err).to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias for ProvisionError
pub type Result<T> = std::result::Result<T, ProvisionError>;
