//! Draft synchronization engine for field reports
//!
//! Turns a long-lived, user-edited report (ordered sections, typed fields and
//! photo attachments) into a durable remote draft without losing data,
//! duplicating remote resources or blocking the editor.
//!
//! ## Architecture
//!
//! ```text
//! edits ──► DraftDocument ──► Debouncer ──► autosave cycle (save queue)
//!                                              │
//!                        Eligibility gate ◄────┤
//!                   Creation coordinator ◄─────┤  single-flight POST
//!                           field patch  ◄─────┤  PATCH /searches/{id}
//!                 Attachment reconciler  ◄─────┘  one multipart POST per slot
//!                                              │
//!                          LifecycleEvent / AutosaveState ──► host UI
//! ```
//!
//! - A remote draft is created only once the `general_info` identity fields
//!   are filled in, or when the user explicitly saves or finalizes.
//! - Concurrent callers share one in-flight creation.
//! - Save cycles are serialized per document; a cycle never clears edits made
//!   while it was running.
//! - A draft that vanished remotely (404 on patch) is recreated once.
//! - Failed uploads keep their files; every failure is retried on the next
//!   trigger.
//! - [`DraftSession::dispose`] flushes pending changes before the session
//!   goes away.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldops_drafts::{
//!     AutosaveConfig, DraftSession, FIELD_ADRESSE, FIELD_NOM, FIELD_PRENOM, GENERAL_INFO,
//! };
//! use fieldops_gateway::{GatewayClient, GatewayConfig, StaticCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::new(
//!     GatewayConfig::default(),
//!     Arc::new(StaticCredentials::new(Some("token".into()))),
//! )?;
//! let session = DraftSession::new(Arc::new(client), AutosaveConfig::default());
//!
//! session.update_field(GENERAL_INFO, FIELD_NOM, "Jean")?;
//! session.update_field(GENERAL_INFO, FIELD_PRENOM, "Dupont")?;
//! session.update_field(GENERAL_INFO, FIELD_ADRESSE, "1 Rue X")?;
//!
//! // Editor closes
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod context;
mod coordinator;
pub mod document;
pub mod error;
pub mod events;
pub mod gate;
pub mod gateway;
pub mod mock;
mod reconciler;
mod scheduler;
pub mod session;

pub use config::AutosaveConfig;
pub use document::projection::project;
pub use document::{
    Attachment, AttachmentSlot, ConfirmedAttachment, DocumentSnapshot, DraftDocument, DraftStatus,
    Field, LocalHandle, NewAttachment, PendingAttachment, Section, SectionKind, DESCRIPTION,
    FIELD_ADRESSE, FIELD_CONTENT, FIELD_DESCRIPTION, FIELD_NOM, FIELD_OBSERVATIONS, FIELD_PRENOM,
    GENERAL_INFO, OBSERVATIONS, PROFILE_SLOT_ID,
};
pub use error::{Result, SyncError, SyncErrorKind};
pub use events::{AutosaveState, LifecycleEvent};
pub use gate::{is_eligible, missing_required_fields};
pub use gateway::DraftGateway;
pub use session::DraftSession;
