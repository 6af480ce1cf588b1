//! In-memory gateway for testing.

use crate::gateway::DraftGateway;
use async_trait::async_trait;
use chrono::Utc;
use fieldops_gateway::{
    DraftId, DraftPatch, DraftRecord, GatewayError, PhotoRecord, SearchStatus, UploadBatch,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Failure to inject into the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Server(u16),
    NotFound,
}

impl MockFailure {
    fn into_error(self, resource: &str) -> GatewayError {
        match self {
            MockFailure::Server(status) => GatewayError::Server {
                status,
                message: "injected failure".to_string(),
            },
            MockFailure::NotFound => GatewayError::NotFound(resource.to_string()),
        }
    }
}

/// One multipart upload as seen by the server
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpload {
    pub draft_id: DraftId,
    pub section_id: String,
    pub is_profile: bool,
    pub file_names: Vec<String>,
}

#[derive(Default)]
struct MockState {
    drafts: HashMap<DraftId, DraftRecord>,
    next_id: usize,
    next_photo: usize,
    calls: Vec<String>,
    uploads: Vec<RecordedUpload>,
    fail_next_create: Option<MockFailure>,
    fail_next_patch: Option<MockFailure>,
    fail_uploads: Option<MockFailure>,
}

/// Mock drafts API for engine tests.
///
/// Keeps drafts in memory, counts every call and can inject failures or
/// latency. Ids are `draft-1`, `draft-2`, ...
pub struct MockGateway {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    authenticated: AtomicBool,
    creates: AtomicUsize,
    patches: AtomicUsize,
    uploads: AtomicUsize,
    photo_deletes: AtomicUsize,
    draft_deletes: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            latency: None,
            authenticated: AtomicBool::new(true),
            creates: AtomicUsize::new(0),
            patches: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            photo_deletes: AtomicUsize::new(0),
            draft_deletes: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate a missing bearer credential.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self) {
        self.state().fail_next_create = Some(MockFailure::Server(503));
    }

    pub fn fail_next_patch(&self, failure: MockFailure) {
        self.state().fail_next_patch = Some(failure);
    }

    /// Fail every upload until cleared with `None`.
    pub fn fail_uploads(&self, failure: Option<MockFailure>) {
        self.state().fail_uploads = failure;
    }

    /// Delete a draft behind the engine's back.
    pub fn vanish(&self, id: &DraftId) {
        self.state().drafts.remove(id);
    }

    /// Insert a draft without counting a create call.
    pub fn seed_draft(&self) -> DraftId {
        Self::insert_draft(&mut self.state())
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn delete_photo_count(&self) -> usize {
        self.photo_deletes.load(Ordering::SeqCst)
    }

    pub fn delete_draft_count(&self) -> usize {
        self.draft_deletes.load(Ordering::SeqCst)
    }

    /// Requests in arrival order, e.g. `PATCH /searches/draft-1`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.state().uploads.clone()
    }

    pub fn draft(&self, id: &DraftId) -> Option<DraftRecord> {
        self.state().drafts.get(id).cloned()
    }

    /// Drafts still stored, whatever their status.
    pub fn draft_count(&self) -> usize {
        self.state().drafts.len()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_draft(state: &mut MockState) -> DraftId {
        state.next_id += 1;
        let id = DraftId::new(format!("draft-{}", state.next_id));
        let now = Utc::now().to_rfc3339();
        state.drafts.insert(
            id.clone(),
            DraftRecord {
                id: id.clone(),
                nom: None,
                prenom: None,
                location: None,
                description: None,
                observations: None,
                status: Some(SearchStatus::Draft),
                photos: Some(Vec::new()),
                created_at: Some(now.clone()),
                updated_at: Some(now),
            },
        );
        id
    }

    /// Latency and credential check shared by every call
    async fn enter(&self, call: String) -> Result<(), GatewayError> {
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(GatewayError::AuthMissing);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.state().calls.push(call);
        Ok(())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DraftGateway for MockGateway {
    async fn create_draft(&self) -> Result<DraftId, GatewayError> {
        self.enter("POST /searches/draft".to_string()).await?;
        self.creates.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if let Some(failure) = state.fail_next_create.take() {
            return Err(failure.into_error("searches"));
        }
        Ok(Self::insert_draft(&mut state))
    }

    async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<(), GatewayError> {
        self.enter(format!("PATCH /searches/{id}")).await?;
        self.patches.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if let Some(failure) = state.fail_next_patch.take() {
            return Err(failure.into_error(id.as_str()));
        }
        let record = state
            .drafts
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        record.nom = Some(patch.nom.clone());
        record.prenom = Some(patch.prenom.clone());
        record.location = Some(patch.location.clone());
        record.description = Some(patch.description.clone());
        record.observations = Some(patch.observations.clone());
        record.status = Some(patch.status);
        record.updated_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }

    async fn upload_photos(
        &self,
        id: &DraftId,
        batch: UploadBatch,
    ) -> Result<Vec<PhotoRecord>, GatewayError> {
        self.enter(format!("POST /searches/{id}/photos")).await?;
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        state.uploads.push(RecordedUpload {
            draft_id: id.clone(),
            section_id: batch.section_id.clone(),
            is_profile: batch.is_profile,
            file_names: batch.files.iter().map(|f| f.file_name.clone()).collect(),
        });
        if let Some(failure) = state.fail_uploads {
            return Err(failure.into_error(id.as_str()));
        }
        if !state.drafts.contains_key(id) {
            return Err(GatewayError::NotFound(id.to_string()));
        }

        let mut created = Vec::with_capacity(batch.files.len());
        for (i, file) in batch.files.iter().enumerate() {
            state.next_photo += 1;
            let filename = format!("p{}-{}", state.next_photo, file.file_name);
            created.push(PhotoRecord {
                url: Some(format!("https://storage.test/{id}/{filename}")),
                filename,
                original_name: Some(file.file_name.clone()),
                section_id: Some(batch.section_id.clone()),
                is_profile: batch.is_profile && i == 0,
                number: None,
                uploaded_at: Some(Utc::now().to_rfc3339()),
            });
        }

        let record = state
            .drafts
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let photos = record.photos.get_or_insert_with(Vec::new);
        if batch.is_profile {
            for photo in photos.iter_mut() {
                photo.is_profile = false;
            }
        }
        photos.extend(created.iter().cloned());
        for (n, photo) in photos.iter_mut().enumerate() {
            photo.number = Some(n as u32 + 1);
        }

        Ok(created)
    }

    async fn delete_photo(&self, id: &DraftId, filename: &str) -> Result<(), GatewayError> {
        self.enter(format!("DELETE /searches/{id}/photos/{filename}")).await?;
        self.photo_deletes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        let record = state
            .drafts
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let photos = record.photos.get_or_insert_with(Vec::new);
        let before = photos.len();
        photos.retain(|p| p.filename != filename);
        if photos.len() == before {
            return Err(GatewayError::NotFound(filename.to_string()));
        }
        for (n, photo) in photos.iter_mut().enumerate() {
            photo.number = Some(n as u32 + 1);
        }
        Ok(())
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), GatewayError> {
        self.enter(format!("DELETE /searches/{id}")).await?;
        self.draft_deletes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        let status = state
            .drafts
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?
            .status;

        // Drafts are deleted, anything else is archived
        match status {
            Some(SearchStatus::Draft) | Some(SearchStatus::Archived) | None => {
                state.drafts.remove(id);
            }
            Some(_) => {
                if let Some(record) = state.drafts.get_mut(id) {
                    record.status = Some(SearchStatus::Archived);
                }
            }
        }
        Ok(())
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, GatewayError> {
        self.enter("GET /searches?status=DRAFT".to_string()).await?;

        let state = self.state();
        let mut drafts: Vec<DraftRecord> = state
            .drafts
            .values()
            .filter(|d| d.status == Some(SearchStatus::Draft))
            .cloned()
            .collect();
        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(drafts)
    }

    async fn get_draft(&self, id: &DraftId) -> Result<DraftRecord, GatewayError> {
        self.enter(format!("GET /searches/{id}")).await?;

        self.state()
            .drafts
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}
