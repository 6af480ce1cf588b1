//! Remote gateway seam
//!
//! The engine talks to the drafts API only through [`DraftGateway`], so hosts
//! can plug in the HTTP client, an offline queue, or the in-memory
//! [`MockGateway`](crate::mock::MockGateway) used in tests.

use async_trait::async_trait;
use fieldops_gateway::{
    DraftId, DraftPatch, DraftRecord, GatewayClient, GatewayError, PhotoRecord, SearchStatus,
    UploadBatch,
};

#[async_trait]
pub trait DraftGateway: Send + Sync {
    /// `POST /searches/draft`
    async fn create_draft(&self) -> Result<DraftId, GatewayError>;

    /// `PATCH /searches/{id}`
    async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<(), GatewayError>;

    /// `POST /searches/{id}/photos`, one multipart request per batch
    async fn upload_photos(
        &self,
        id: &DraftId,
        batch: UploadBatch,
    ) -> Result<Vec<PhotoRecord>, GatewayError>;

    /// `DELETE /searches/{id}/photos/{filename}`
    async fn delete_photo(&self, id: &DraftId, filename: &str) -> Result<(), GatewayError>;

    /// `DELETE /searches/{id}`
    async fn delete_draft(&self, id: &DraftId) -> Result<(), GatewayError>;

    /// `GET /searches?status=DRAFT`
    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, GatewayError>;

    /// `GET /searches/{id}`
    async fn get_draft(&self, id: &DraftId) -> Result<DraftRecord, GatewayError>;
}

#[async_trait]
impl DraftGateway for GatewayClient {
    async fn create_draft(&self) -> Result<DraftId, GatewayError> {
        GatewayClient::create_draft(self).await
    }

    async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<(), GatewayError> {
        GatewayClient::update_draft(self, id, patch).await
    }

    async fn upload_photos(
        &self,
        id: &DraftId,
        batch: UploadBatch,
    ) -> Result<Vec<PhotoRecord>, GatewayError> {
        GatewayClient::upload_photos(self, id, batch).await
    }

    async fn delete_photo(&self, id: &DraftId, filename: &str) -> Result<(), GatewayError> {
        GatewayClient::delete_photo(self, id, filename).await
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), GatewayError> {
        GatewayClient::delete_draft(self, id).await
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, GatewayError> {
        GatewayClient::list_drafts(self, SearchStatus::Draft).await
    }

    async fn get_draft(&self, id: &DraftId) -> Result<DraftRecord, GatewayError> {
        GatewayClient::get_draft(self, id).await
    }
}
