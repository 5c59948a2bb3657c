//! Error types for setup and per-image registry operations
//!
//! [`MigrateError`] is the fatal tier: anything that goes wrong before the
//! pipeline starts. [`ClientError`] is the per-item tier returned by a
//! [`RegistryClient`](crate::common::RegistryClient) call; the pipeline logs
//! it and moves on.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Invalid arguments or settings
    #[error("Configuration error: {0}")]
    Config(String),
    /// Registry credentials could not be obtained or decoded
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Source repository metadata could not be loaded
    #[error("Metadata error: {0}")]
    Metadata(String),
    /// Target repositories could not be resolved
    #[error("Target resolution error: {0}")]
    Target(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure of a single pull, tag or push call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level engine failure (connection, I/O, timeout)
    #[error("docker engine error: {0}")]
    Engine(bollard::errors::Error),
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },
    /// Error reported inside a streamed daemon response
    #[error("daemon reported: {0}")]
    Stream(String),
    #[error("invalid image reference: {0:?}")]
    InvalidReference(String),
    #[error("invalid registry auth token: {0}")]
    InvalidAuth(String),
}

impl ClientError {
    /// Errors the daemon or the network may not repeat on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Engine(_) | ClientError::Stream(_) => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::InvalidReference(_) | ClientError::InvalidAuth(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_context() {
        let err = ClientError::Status {
            operation: "push",
            status: 404,
            message: "no such image".to_string(),
        };
        assert_eq!(err.to_string(), "push failed with status 404: no such image");
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = ClientError::Status {
            operation: "pull",
            status: 503,
            message: String::new(),
        };
        assert!(err.is_transient());
        assert!(!ClientError::InvalidReference(String::new()).is_transient());
    }
}
