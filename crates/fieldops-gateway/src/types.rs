//! Types for the drafts API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the platform API (e.g. "http://localhost:8001/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://localhost:8001/api".to_string() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Server-assigned identifier of a draft report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DraftId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DraftId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Report status as stored server-side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Draft,
    Active,
    Shared,
    Processed,
    Archived,
    #[serde(other)]
    Unknown,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Draft => "DRAFT",
            SearchStatus::Active => "ACTIVE",
            SearchStatus::Shared => "SHARED",
            SearchStatus::Processed => "PROCESSED",
            SearchStatus::Archived => "ARCHIVED",
            SearchStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Photo metadata as returned by upload and fetch endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Server-generated unique file name, the key for deletion
    pub filename: String,
    /// Signed URL (may be absent when signing failed)
    #[serde(default)]
    pub url: Option<String>,
    /// File name as uploaded
    #[serde(default)]
    pub original_name: Option<String>,
    /// Section the photo belongs to
    #[serde(default)]
    pub section_id: Option<String>,
    /// Profile photo flag
    #[serde(default)]
    pub is_profile: bool,
    /// 1-based position within the report
    #[serde(default)]
    pub number: Option<u32>,
    /// Upload timestamp (ISO 8601)
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// A stored report (draft or otherwise)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: DraftId,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub prenom: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub status: Option<SearchStatus>,
    #[serde(default)]
    pub photos: Option<Vec<PhotoRecord>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl DraftRecord {
    /// Photos attached to this report (the column may be null)
    pub fn photos(&self) -> &[PhotoRecord] {
        self.photos.as_deref().unwrap_or(&[])
    }
}

/// Request body for `PATCH /searches/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPatch {
    pub nom: String,
    pub prenom: String,
    pub location: String,
    pub description: String,
    pub observations: String,
    pub status: SearchStatus,
}

/// A file to send in a multipart photo upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One multipart upload: every file goes to the same section
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub section_id: String,
    pub is_profile: bool,
    pub files: Vec<UploadFile>,
}

/// Response from `POST /searches/draft`
///
/// The platform wraps the created row in `search`; older deployments return
/// the bare row.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreateDraftResponse {
    Wrapped { search: DraftRecord },
    Bare { id: DraftId },
}

impl CreateDraftResponse {
    pub(crate) fn into_id(self) -> DraftId {
        match self {
            CreateDraftResponse::Wrapped { search } => search.id,
            CreateDraftResponse::Bare { id } => id,
        }
    }
}

/// Response from `POST /searches/{id}/photos`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadPhotosResponse {
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
}

/// Response from `GET /searches`
///
/// A plain array without pagination, a page object otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListDraftsResponse {
    Plain(Vec<DraftRecord>),
    Paged { items: Vec<DraftRecord> },
}

impl ListDraftsResponse {
    pub(crate) fn into_items(self) -> Vec<DraftRecord> {
        match self {
            ListDraftsResponse::Plain(items) | ListDraftsResponse::Paged { items } => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_response_accepts_both_shapes() {
        let wrapped: CreateDraftResponse = serde_json::from_str(
            r#"{"message":"Brouillon créé","search":{"id":"d-1","status":"DRAFT"}}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_id().as_str(), "d-1");

        let bare: CreateDraftResponse = serde_json::from_str(r#"{"id":"d-2"}"#).unwrap();
        assert_eq!(bare.into_id().as_str(), "d-2");
    }

    #[test]
    fn test_record_with_null_photos() {
        let record: DraftRecord = serde_json::from_str(
            r#"{"id":"d-1","location":"","photos":null,"status":"DRAFT"}"#,
        )
        .unwrap();
        assert!(record.photos().is_empty());
        assert_eq!(record.status, Some(SearchStatus::Draft));
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let record: DraftRecord =
            serde_json::from_str(r#"{"id":"d-1","status":"PENDING_REVIEW"}"#).unwrap();
        assert_eq!(record.status, Some(SearchStatus::Unknown));
    }

    #[test]
    fn test_patch_serializes_status_uppercase() {
        let patch = DraftPatch {
            nom: "Jean".into(),
            prenom: "Dupont".into(),
            location: "1 Rue X".into(),
            description: String::new(),
            observations: String::new(),
            status: SearchStatus::Active,
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["location"], "1 Rue X");
    }

    #[test]
    fn test_list_response_shapes() {
        let plain: ListDraftsResponse = serde_json::from_str(r#"[{"id":"a"},{"id":"b"}]"#).unwrap();
        assert_eq!(plain.into_items().len(), 2);

        let paged: ListDraftsResponse = serde_json::from_str(
            r#"{"items":[{"id":"a"}],"page":1,"page_size":10,"has_more":false}"#,
        )
        .unwrap();
        assert_eq!(paged.into_items().len(), 1);
    }
}
