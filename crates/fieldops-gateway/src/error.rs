//! Error types for the drafts API client

use thiserror::Error;

/// Drafts API client error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Draft or photo not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No bearer credential available, nothing was sent
    #[error("No bearer credential available")]
    AuthMissing,

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether the remote resource no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
