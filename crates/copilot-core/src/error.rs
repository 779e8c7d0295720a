//! Error types for the copilot workspace.

use thiserror::Error;

/// A shared error type for the entire copilot application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CopilotError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "SSE", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to a backend
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CopilotError {
    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Classification of a failed exchange before or while the stream is read.
///
/// Each variant maps to exactly one user-facing message per backend, see
/// [`crate::messages::transport_failure`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server could not be reached (refused, DNS, TLS).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The exchange exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Any other error raised by the HTTP client.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-2xx status without a more specific meaning.
    #[error("unexpected status code {0}")]
    Status(u16),

    /// HTTP 401 on a streaming call.
    #[error("unauthorized (401)")]
    Unauthorized,

    /// HTTP 429.
    #[error("too many requests (429)")]
    TooManyRequests,

    /// The API key was rejected while bootstrapping a session.
    #[error("invalid API key")]
    InvalidApiKey,

    /// The body stream broke off before a terminal frame.
    #[error("response ended prematurely: {0}")]
    EndedPrematurely(String),

    /// The websocket upgrade was answered with a non-101 status.
    #[error("websocket handshake with {url} failed: {detail}")]
    Handshake { url: String, detail: String },

    /// Any other websocket failure.
    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl From<std::io::Error> for CopilotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CopilotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from String (for error messages)
impl From<String> for CopilotError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, CopilotError>`.
pub type Result<T> = std::result::Result<T, CopilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let err: CopilotError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        match err {
            CopilotError::Io { message } => assert!(message.contains("PermissionDenied")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_transport_error_is_wrapped() {
        let err: CopilotError = TransportError::Timeout.into();
        assert!(err.is_transport());
        assert!(!err.is_config());
        assert_eq!(err.to_string(), "Transport error: request timed out");
    }
}
