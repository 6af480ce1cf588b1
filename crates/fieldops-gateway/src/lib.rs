//! Rust client for the field report drafts API
//!
//! Typed access to the `/searches` endpoints used while a technician edits a
//! report: draft creation, field patches, photo upload and deletion, listing
//! and discarding drafts. Every call carries the bearer token supplied by a
//! [`CredentialProvider`]; without one the call fails with
//! [`GatewayError::AuthMissing`] before touching the network.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldops_gateway::{
//!     DraftPatch, GatewayClient, GatewayConfig, SearchStatus, StaticCredentials,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::new(
//!     GatewayConfig::default(),
//!     Arc::new(StaticCredentials::new(Some("token".into()))),
//! )?;
//!
//! let id = client.create_draft().await?;
//! client
//!     .update_draft(&id, &DraftPatch {
//!         nom: "Jean".into(),
//!         prenom: "Dupont".into(),
//!         location: "1 Rue X".into(),
//!         description: String::new(),
//!         observations: String::new(),
//!         status: SearchStatus::Draft,
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

// Re-export main types
pub use auth::{CredentialProvider, StaticCredentials};
pub use client::GatewayClient;
pub use error::{GatewayError, Result};
pub use types::{
    DraftId, DraftPatch, DraftRecord, GatewayConfig, PhotoRecord, SearchStatus, UploadBatch,
    UploadFile,
};
