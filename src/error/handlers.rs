//! Standardized mapping of Docker daemon responses to client errors

use crate::error::{ClientError, MigrateError};
use bollard::errors::Error as EngineError;

/// Maps failures reported by the Docker Engine API
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Build a [`ClientError`] for a failed image operation.
    ///
    /// The daemon answers errors with `{"message": "..."}`; when the body is
    /// not in that shape the raw text is kept.
    pub fn handle_image_error(status: u16, body: &str, operation: &'static str) -> ClientError {
        let detail = Self::daemon_message(body);
        let message = match status {
            401 => format!("registry rejected credentials: {}", detail),
            403 => format!("permission denied: {}", detail),
            404 => format!("no such image or repository: {}", detail),
            409 => format!("conflict: {}", detail),
            429 => format!("rate limited by registry: {}", detail),
            500 => format!("daemon internal error: {}", detail),
            502 | 503 => format!("registry unavailable: {}", detail),
            _ => detail,
        };

        ClientError::Status {
            operation,
            status,
            message,
        }
    }

    /// Sort an engine error into status, in-stream or transport failures
    pub fn handle_engine_error(error: EngineError, operation: &'static str) -> ClientError {
        match error {
            EngineError::DockerResponseServerError { status_code, message } => {
                Self::handle_image_error(status_code, &message, operation)
            }
            EngineError::DockerStreamError { error } => ClientError::Stream(error),
            other => ClientError::Engine(other),
        }
    }

    /// Build the fatal error raised when the daemon cannot be reached at all
    pub fn handle_connect_error(error: &EngineError, host: &str) -> MigrateError {
        match error {
            EngineError::DockerResponseServerError { status_code, message } => MigrateError::Config(format!(
                "Docker daemon at {} answered with status {}: {}",
                host,
                status_code,
                Self::daemon_message(message)
            )),
            other => MigrateError::Config(format!("cannot connect to Docker daemon at {}: {}", host, other)),
        }
    }

    fn daemon_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_daemon_message() {
        let err = HttpErrorHandler::handle_image_error(404, r#"{"message":"No such image: app:v1"}"#, "tag");
        match err {
            ClientError::Status { operation, status, message } => {
                assert_eq!(operation, "tag");
                assert_eq!(status, 404);
                assert_eq!(message, "no such image or repository: No such image: app:v1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keeps_plain_text_bodies() {
        let err = HttpErrorHandler::handle_image_error(418, "teapot\n", "push");
        assert_eq!(err.to_string(), "push failed with status 418: teapot");
    }

    #[test]
    fn sorts_engine_errors() {
        let err = HttpErrorHandler::handle_engine_error(
            EngineError::DockerResponseServerError {
                status_code: 503,
                message: "registry down".to_string(),
            },
            "push",
        );
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
        assert!(err.is_transient());

        let err = HttpErrorHandler::handle_engine_error(
            EngineError::DockerStreamError {
                error: "denied".to_string(),
            },
            "pull",
        );
        assert!(matches!(err, ClientError::Stream(ref m) if m == "denied"));
    }
}
