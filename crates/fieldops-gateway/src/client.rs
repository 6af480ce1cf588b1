//! HTTP client for the drafts API

use crate::auth::CredentialProvider;
use crate::error::{GatewayError, Result};
use crate::types::*;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the drafts API
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fieldops_gateway::{GatewayClient, GatewayConfig, StaticCredentials};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GatewayClient::new(
///     GatewayConfig {
///         base_url: "http://localhost:8001/api".into(),
///         ..Default::default()
///     },
///     Arc::new(StaticCredentials::new(Some("token".into()))),
/// )?;
///
/// let id = client.create_draft().await?;
/// let drafts = client.list_drafts(fieldops_gateway::SearchStatus::Draft).await?;
/// # Ok(())
/// # }
/// ```
pub struct GatewayClient {
    config: GatewayConfig,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl GatewayClient {
    /// Create a new drafts API client
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Whether a bearer credential is currently available
    pub fn has_credentials(&self) -> bool {
        self.credentials.bearer_token().is_some()
    }

    // ==================== Drafts ====================

    /// Create an empty draft and return its id
    pub async fn create_draft(&self) -> Result<DraftId> {
        let url = format!("{}/searches/draft", self.base_url());

        let request = self.authorized(self.client.post(&url))?;
        let response = request.send().await?;
        let created: CreateDraftResponse = self.handle_response(response, "draft").await?;

        let id = created.into_id();
        if id.as_str().trim().is_empty() {
            return Err(GatewayError::InvalidResponse(
                "server returned an empty draft id".to_string(),
            ));
        }
        debug!(draft_id = %id, "Draft created");
        Ok(id)
    }

    /// Update the editable fields of a draft
    pub async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<()> {
        let url = self.draft_url(id);

        let request = self.authorized(
            self.client
                .patch(&url)
                .header(header::CONTENT_TYPE, "application/json")
                .json(patch),
        )?;
        let response = request.send().await?;
        self.handle_empty(response, &format!("draft {}", id)).await
    }

    /// Fetch a draft with its photos
    pub async fn get_draft(&self, id: &DraftId) -> Result<DraftRecord> {
        let url = self.draft_url(id);

        let request = self.authorized(self.client.get(&url))?;
        let response = request.send().await?;
        self.handle_response(response, &format!("draft {}", id)).await
    }

    /// List reports with the given status
    pub async fn list_drafts(&self, status: SearchStatus) -> Result<Vec<DraftRecord>> {
        let url = format!("{}/searches?status={}", self.base_url(), status.as_str());

        let request = self.authorized(self.client.get(&url))?;
        let response = request.send().await?;
        let listed: ListDraftsResponse = self.handle_response(response, "drafts").await?;
        Ok(listed.into_items())
    }

    /// Delete a draft (the server archives non-draft reports instead)
    pub async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        let url = self.draft_url(id);

        let request = self.authorized(self.client.delete(&url))?;
        let response = request.send().await?;
        self.handle_empty(response, &format!("draft {}", id)).await
    }

    // ==================== Photos ====================

    /// Upload a batch of photos into one section of a draft
    pub async fn upload_photos(
        &self,
        id: &DraftId,
        batch: UploadBatch,
    ) -> Result<Vec<PhotoRecord>> {
        if batch.files.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/photos", self.draft_url(id));
        let file_count = batch.files.len();

        let mut form = Form::new().text("section_id", batch.section_id.clone());
        if batch.is_profile {
            form = form.text("is_profile", "true");
        }
        for file in batch.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        let request = self.authorized(self.client.post(&url).multipart(form))?;
        let response = request.send().await?;
        let uploaded: UploadPhotosResponse =
            self.handle_response(response, &format!("draft {}", id)).await?;

        // A 200 means the whole batch was stored, even when fewer records come back
        if uploaded.photos.len() != file_count {
            warn!(
                draft_id = %id,
                section_id = %batch.section_id,
                sent = file_count,
                confirmed = uploaded.photos.len(),
                "Server confirmed a different number of photos"
            );
        }

        debug!(
            draft_id = %id,
            section_id = %batch.section_id,
            count = uploaded.photos.len(),
            "Photos uploaded"
        );
        Ok(uploaded.photos)
    }

    /// Delete one photo by its server file name
    pub async fn delete_photo(&self, id: &DraftId, filename: &str) -> Result<()> {
        let url = format!(
            "{}/photos/{}",
            self.draft_url(id),
            urlencoding::encode(filename)
        );

        let request = self.authorized(self.client.delete(&url))?;
        let response = request.send().await?;
        self.handle_empty(response, &format!("photo {}", filename)).await
    }

    // ==================== Helper Methods ====================

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn draft_url(&self, id: &DraftId) -> String {
        format!(
            "{}/searches/{}",
            self.base_url(),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(GatewayError::AuthMissing)?;
        Ok(request.bearer_auth(token))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        resource: &str,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(resource.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Server {
                status,
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)?;
        Ok(body)
    }

    async fn handle_empty(&self, response: reqwest::Response, resource: &str) -> Result<()> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(resource.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Server { status, message: body });
        }
        Ok(())
    }
}
