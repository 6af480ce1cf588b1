//! Lifecycle controller
//!
//! [`DraftSession`] owns one editor's document and wires the pieces together:
//! edits go through the session so the debouncer hears about them, saves run
//! through the scheduler, and finalize, discard and dispose close the
//! document's lifecycle.

use crate::config::AutosaveConfig;
use crate::context::DraftContext;
use crate::coordinator;
use crate::document::projection::project;
use crate::document::{
    Attachment, AttachmentSlot, DocumentSnapshot, DraftDocument, DraftStatus, LocalHandle,
    NewAttachment,
};
use crate::error::{Result, SyncError};
use crate::events::{AutosaveState, LifecycleEvent};
use crate::gate;
use crate::gateway::DraftGateway;
use crate::reconciler;
use crate::scheduler::{self, Debouncer};
use chrono::Utc;
use fieldops_gateway::{DraftId, DraftRecord, SearchStatus};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// One editor session over one draft document.
///
/// With autosave enabled the session spawns its debouncer on the current
/// Tokio runtime, so it must be created from within one. Call
/// [`dispose`](Self::dispose) when the editor closes: dropping the session
/// cancels the debouncer without a final flush.
pub struct DraftSession {
    ctx: Arc<DraftContext>,
    debouncer: Option<Debouncer>,
}

impl DraftSession {
    /// Open a fresh, empty document
    pub fn new(gateway: Arc<dyn DraftGateway>, config: AutosaveConfig) -> Self {
        Self::with_document(gateway, config, DraftDocument::new())
    }

    /// Reopen a stored draft for editing
    pub async fn resume(
        gateway: Arc<dyn DraftGateway>,
        config: AutosaveConfig,
        draft_id: &DraftId,
    ) -> Result<Self> {
        let record = gateway.get_draft(draft_id).await?;
        info!(draft_id = %draft_id, photos = record.photos().len(), "Resuming draft");
        Ok(Self::with_document(gateway, config, DraftDocument::from_record(&record)))
    }

    fn with_document(
        gateway: Arc<dyn DraftGateway>,
        config: AutosaveConfig,
        document: DraftDocument,
    ) -> Self {
        let ctx = Arc::new(DraftContext::new(gateway, document, config.event_capacity));
        let debouncer = config
            .enabled
            .then(|| Debouncer::spawn(ctx.clone(), &config));
        Self { ctx, debouncer }
    }

    /// Drafts of the current user, most recent first
    pub async fn list_drafts(&self) -> Result<Vec<DraftRecord>> {
        Ok(self.ctx.gateway.list_drafts().await?)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.ctx.lock().snapshot()
    }

    pub fn draft_id(&self) -> Option<DraftId> {
        self.ctx.lock().draft_id().cloned()
    }

    pub fn status(&self) -> DraftStatus {
        self.ctx.lock().status()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.ctx.lock().has_pending_changes()
    }

    pub fn autosave_state(&self) -> AutosaveState {
        self.ctx.autosave_state()
    }

    pub fn watch_autosave(&self) -> watch::Receiver<AutosaveState> {
        self.ctx.watch_autosave()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.ctx.subscribe()
    }

    // =========================================================================
    // Edits
    // =========================================================================

    fn edit<T>(&self, apply: impl FnOnce(&mut DraftDocument) -> Result<T>) -> Result<T> {
        let out = apply(&mut self.ctx.lock())?;
        self.ctx.edits.notify_one();
        Ok(out)
    }

    pub fn update_field(
        &self,
        section_id: &str,
        field_id: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.edit(|doc| doc.update_field(section_id, field_id, value))
    }

    pub fn add_section(&self, title: impl Into<String>) -> Result<String> {
        self.edit(|doc| doc.add_section(title))
    }

    /// Remove a user-defined section. Its photos already on the server stay there.
    pub fn remove_section(&self, section_id: &str) -> Result<()> {
        let removed = self.edit(|doc| doc.remove_section(section_id))?;
        let previews: Vec<String> = removed
            .attachments
            .into_iter()
            .filter_map(|a| match a {
                Attachment::Pending(p) => p.preview_url,
                Attachment::Confirmed(_) => None,
            })
            .collect();
        self.release_previews(previews);
        Ok(())
    }

    pub fn set_collapsed(&self, section_id: &str, collapsed: bool) -> Result<()> {
        self.ctx.lock().set_collapsed(section_id, collapsed)
    }

    pub fn add_attachments(
        &self,
        section_id: &str,
        files: Vec<NewAttachment>,
    ) -> Result<Vec<LocalHandle>> {
        self.edit(|doc| doc.add_attachments(section_id, files))
    }

    pub fn set_profile_photo(&self, file: NewAttachment) -> Result<LocalHandle> {
        self.edit(|doc| doc.set_profile_photo(file))
    }

    /// Drop a photo that has not been uploaded yet
    pub fn remove_pending_attachment(&self, handle: LocalHandle) -> Result<()> {
        let preview = self.edit(|doc| doc.remove_pending_attachment(handle))?;
        self.release_previews(preview.into_iter().collect());
        Ok(())
    }

    /// Delete an uploaded photo; the local entry goes only once the server agrees
    pub async fn delete_attachment(&self, slot: &AttachmentSlot, filename: &str) -> Result<()> {
        let _queue = self.ctx.save_queue.lock().await;
        if let Err(err) = reconciler::delete_confirmed(&self.ctx, slot, filename).await {
            warn!(slot = %slot, filename, error = %err, "Photo deletion failed");
            if let Some(kind) = err.kind() {
                self.ctx.lock().record_error(kind);
                self.ctx.publish_error(&err);
            }
            return Err(err);
        }
        Ok(())
    }

    fn release_previews(&self, preview_urls: Vec<String>) {
        if !preview_urls.is_empty() {
            self.ctx.emit(LifecycleEvent::PreviewsReleased { preview_urls });
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Resolve the remote draft id, creating the draft if allowed
    pub async fn ensure_draft(&self, force_creation: bool) -> Option<DraftId> {
        coordinator::ensure_draft(&self.ctx, force_creation).await
    }

    /// Run one autosave cycle now. Returns whether anything was saved.
    pub async fn autosave(&self, force_save: bool) -> bool {
        scheduler::autosave(&self.ctx, force_save).await
    }

    /// Explicit save: creates the draft even if identity fields are missing
    pub async fn save_now(&self) -> bool {
        if self.ensure_draft(true).await.is_none() {
            return false;
        }
        self.autosave(true).await
    }

    /// Flush-on-exit for navigation or tab changes: forced save when anything is pending
    pub async fn flush(&self) -> bool {
        if !self.has_pending_changes() {
            return false;
        }
        self.autosave(true).await
    }

    /// Submit the report.
    ///
    /// Refuses with [`SyncError::NotEligible`] while identity fields are
    /// missing. On success the report is `ACTIVE` remotely and the session
    /// holds a fresh empty document. On failure the document is kept.
    pub async fn finalize(&self) -> Result<DraftId> {
        let _queue = self.ctx.save_queue.lock().await;

        let missing = {
            let doc = self.ctx.lock();
            if doc.status().is_terminal() {
                return Err(SyncError::DocumentClosed);
            }
            gate::missing_required_fields(&doc)
        };
        if !missing.is_empty() {
            return Err(SyncError::NotEligible { missing });
        }

        let draft_id = coordinator::ensure_draft(&self.ctx, true)
            .await
            .ok_or(SyncError::CreationFailed)?;

        match self.submit(draft_id).await {
            Ok(draft_id) => {
                self.ctx.lock().close(DraftStatus::Finalized);
                info!(draft_id = %draft_id, "Report finalized");
                self.ctx.emit(LifecycleEvent::Finalized { draft_id: draft_id.clone() });
                drop(self.ctx.reset());
                self.ctx.reset_autosave();
                Ok(draft_id)
            }
            Err(err) => {
                scheduler::record_failure(&self.ctx, &err);
                Err(err)
            }
        }
    }

    async fn submit(&self, draft_id: DraftId) -> Result<DraftId> {
        let (patch, revision) = {
            let mut doc = self.ctx.lock();
            doc.begin_save();
            (project(&doc, SearchStatus::Draft), doc.revision())
        };
        self.ctx.publish(|state| {
            state.saving = true;
            state.error = None;
        });

        let draft_id = scheduler::patch_with_recovery(&self.ctx, draft_id, &patch).await?;
        self.ctx.lock().fields_saved(revision);

        reconciler::flush_pending(&self.ctx, &draft_id).await?;

        let (patch, revision) = {
            let doc = self.ctx.lock();
            (project(&doc, SearchStatus::Active), doc.revision())
        };
        self.ctx.gateway.update_draft(&draft_id, &patch).await?;

        let mut doc = self.ctx.lock();
        doc.fields_saved(revision);
        doc.finish_save(Utc::now());
        Ok(draft_id)
    }

    /// Abandon the report and delete its remote draft.
    ///
    /// A draft already gone remotely is not an error. Any other failure is
    /// returned and the document is kept so the discard can be retried.
    pub async fn discard(&self) -> Result<()> {
        let _queue = self.ctx.save_queue.lock().await;

        let draft_id = {
            let doc = self.ctx.lock();
            if doc.status().is_terminal() {
                return Err(SyncError::DocumentClosed);
            }
            doc.draft_id().cloned()
        };

        if let Some(id) = &draft_id {
            match self.ctx.gateway.delete_draft(id).await {
                Ok(()) => debug!(draft_id = %id, "Remote draft deleted"),
                Err(e) if e.is_not_found() => debug!(draft_id = %id, "Remote draft already gone"),
                Err(e) => {
                    let err = SyncError::from(e);
                    warn!(draft_id = %id, error = %err, "Draft discard failed");
                    if let Some(kind) = err.kind() {
                        self.ctx.lock().record_error(kind);
                    }
                    self.ctx.publish_error(&err);
                    return Err(err);
                }
            }
        }

        self.ctx.lock().close(DraftStatus::Discarded);
        info!(draft_id = ?draft_id.as_ref().map(DraftId::as_str), "Draft discarded");
        self.ctx.emit(LifecycleEvent::Discarded { draft_id });
        drop(self.ctx.reset());
        self.ctx.reset_autosave();
        Ok(())
    }

    /// Flush-on-dispose: stop the debouncer, then save whatever is pending.
    ///
    /// Returns whether the final flush saved anything.
    pub async fn dispose(mut self) -> bool {
        if let Some(debouncer) = self.debouncer.take() {
            debouncer.shutdown().await;
        }
        if !self.has_pending_changes() {
            return false;
        }

        let saved = scheduler::autosave(&self.ctx, true).await;
        if !saved {
            warn!(status = ?self.status(), "Final flush did not save pending changes");
        }
        saved
    }
}

impl Drop for DraftSession {
    fn drop(&mut self) {
        if self.debouncer.is_some() && self.ctx.lock().has_pending_changes() {
            warn!("Draft session dropped with unsaved changes; call dispose() to flush");
        }
    }
}
