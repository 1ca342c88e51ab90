//! Error types for the Lathe client

use lathe_core::ValidationError;
use lathe_core::domain::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Lathe client
///
/// A run that fails on the platform is not an error: it comes back as a
/// [`Run`](lathe_core::domain::run::Run) whose status is `Failed`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credential missing, invalid or expired
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Named resource does not exist
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    /// Named resource is already registered
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// Malformed local input
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// API returned an unexpected error status code
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A blocking wait ran out of time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A blocking wait was cancelled locally
    #[error("Wait cancelled")]
    Cancelled,

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is missing or malformed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || matches!(self, Self::Api { status: 404, .. })
    }

    /// Check if this error reports a duplicate registration
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. }) || matches!(self, Self::Api { status: 409, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}
