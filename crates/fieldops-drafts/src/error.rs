//! Error types for the draft engine

use fieldops_gateway::{DraftId, GatewayError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for draft operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure classes of the sync engine. Every one of them is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// No bearer credential: silent no-op
    AuthMissing,
    /// Required identity fields incomplete: silent no-op, blocking on finalize
    NotEligible,
    /// Remote draft returned 404 and could not be recreated
    DraftVanished,
    /// Retried on the next natural trigger
    TransientNetworkFailure,
    /// Pending photos are kept for the next cycle
    UploadFailure,
}

/// Draft engine error
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No bearer credential available")]
    AuthMissing,

    #[error("Required fields are incomplete: {}", .missing.join(", "))]
    NotEligible { missing: Vec<String> },

    #[error("Draft {0} vanished and could not be recreated")]
    DraftVanished(DraftId),

    #[error("Draft could not be created")]
    CreationFailed,

    #[error("Network error: {0}")]
    Network(GatewayError),

    #[error("Photo upload failed: {0}")]
    Upload(GatewayError),

    #[error("No remote draft exists yet")]
    NoDraft,

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Unknown field {field} in section {section}")]
    UnknownField { section: String, field: String },

    #[error("Section {0} is required and cannot be removed")]
    RequiredSection(String),

    #[error("Unknown attachment: {0}")]
    UnknownAttachment(String),

    #[error("Document is finalized or discarded")]
    DocumentClosed,
}

impl SyncError {
    /// Classification for `lastError`; `None` for caller mistakes
    pub fn kind(&self) -> Option<SyncErrorKind> {
        match self {
            SyncError::AuthMissing => Some(SyncErrorKind::AuthMissing),
            SyncError::NotEligible { .. } => Some(SyncErrorKind::NotEligible),
            SyncError::DraftVanished(_) => Some(SyncErrorKind::DraftVanished),
            SyncError::CreationFailed | SyncError::Network(_) => {
                Some(SyncErrorKind::TransientNetworkFailure)
            }
            SyncError::Upload(GatewayError::AuthMissing) => Some(SyncErrorKind::AuthMissing),
            SyncError::Upload(_) => Some(SyncErrorKind::UploadFailure),
            SyncError::NoDraft
            | SyncError::UnknownSection(_)
            | SyncError::UnknownField { .. }
            | SyncError::RequiredSection(_)
            | SyncError::UnknownAttachment(_)
            | SyncError::DocumentClosed => None,
        }
    }

    /// Absorbed without being surfaced to the user
    pub fn is_silent(&self) -> bool {
        matches!(
            self.kind(),
            Some(SyncErrorKind::AuthMissing) | Some(SyncErrorKind::NotEligible)
        )
    }
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AuthMissing => SyncError::AuthMissing,
            other => SyncError::Network(other),
        }
    }
}
