//! Persistence scheduler
//!
//! One autosave cycle: resolve the draft, patch the projected fields, flush
//! pending photos, publish the result. Cycles run one at a time under the
//! document's save queue so a patch and an upload from two overlapping
//! triggers never interleave.
//!
//! The [`Debouncer`] drives cycles from edits (after a quiet period) and from
//! an optional periodic tick.

use crate::config::AutosaveConfig;
use crate::context::DraftContext;
use crate::coordinator;
use crate::document::projection::project;
use crate::error::{Result, SyncError, SyncErrorKind};
use crate::events::LifecycleEvent;
use crate::reconciler;
use chrono::Utc;
use fieldops_gateway::{DraftId, DraftPatch, SearchStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Run one autosave cycle. Returns whether anything was saved.
///
/// Never creates a draft for an ineligible document. Failures are recorded
/// on the document and in the autosave state; the next trigger retries.
pub(crate) async fn autosave(ctx: &Arc<DraftContext>, force_save: bool) -> bool {
    let _queue = ctx.save_queue.lock().await;

    match run_cycle(ctx, force_save).await {
        Ok(saved) => saved,
        Err(err) => {
            record_failure(ctx, &err);
            false
        }
    }
}

async fn run_cycle(ctx: &Arc<DraftContext>, force_save: bool) -> Result<bool> {
    let Some(draft_id) = coordinator::ensure_draft(ctx, false).await else {
        return Ok(false);
    };

    let (patch, revision) = {
        let mut doc = ctx.lock();
        if doc.status().is_terminal() {
            return Ok(false);
        }
        if !force_save && !doc.has_pending_changes() {
            debug!(draft_id = %draft_id, "Nothing to save");
            return Ok(false);
        }
        doc.begin_save();
        (project(&doc, SearchStatus::Draft), doc.revision())
    };
    ctx.publish(|state| {
        state.saving = true;
        state.error = None;
    });

    let draft_id = patch_with_recovery(ctx, draft_id, &patch).await?;
    ctx.lock().fields_saved(revision);

    reconciler::flush_pending(ctx, &draft_id).await?;

    let saved_at = Utc::now();
    ctx.lock().finish_save(saved_at);
    ctx.publish(|state| {
        state.saving = false;
        state.last_saved = Some(saved_at);
        state.error = None;
    });
    info!(draft_id = %draft_id, revision, "Draft saved");
    ctx.emit(LifecycleEvent::Saved { draft_id, saved_at });
    Ok(true)
}

/// Patch the draft; on 404 recreate it once and retry.
///
/// Returns the id the patch finally landed on.
pub(crate) async fn patch_with_recovery(
    ctx: &Arc<DraftContext>,
    draft_id: DraftId,
    patch: &DraftPatch,
) -> Result<DraftId> {
    match ctx.gateway.update_draft(&draft_id, patch).await {
        Ok(()) => Ok(draft_id),
        Err(e) if e.is_not_found() => {
            warn!(draft_id = %draft_id, "Draft vanished, recreating");
            {
                let mut doc = ctx.lock();
                if doc.draft_id() == Some(&draft_id) {
                    doc.forget_draft();
                }
            }

            let Some(new_id) = coordinator::ensure_draft(ctx, true).await else {
                return Err(SyncError::DraftVanished(draft_id));
            };
            ctx.gateway.update_draft(&new_id, patch).await?;
            info!(old = %draft_id, new = %new_id, "Draft recreated");
            Ok(new_id)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn record_failure(ctx: &DraftContext, err: &SyncError) {
    if err.is_silent() {
        debug!(error = %err, "Autosave skipped");
        ctx.lock().fail_save(None);
        ctx.publish(|state| state.saving = false);
        return;
    }

    warn!(error = %err, "Autosave failed");
    let kind = err.kind().unwrap_or(SyncErrorKind::TransientNetworkFailure);
    ctx.lock().fail_save(Some(kind));
    ctx.publish_error(err);
}

// =============================================================================
// Debouncer
// =============================================================================

/// Background task turning edits into autosave cycles
pub(crate) struct Debouncer {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn spawn(ctx: Arc<DraftContext>, config: &AutosaveConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(ctx, config.debounce(), config.interval(), shutdown_rx));
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the task, letting a cycle already running finish first
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Debouncer task ended abnormally");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    ctx: Arc<DraftContext>,
    debounce: Duration,
    interval: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });
    debug!(?debounce, ?interval, "Debouncer started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ctx.edits.notified() => {
                // Wait for a quiet period; every new edit restarts it
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = ctx.edits.notified() => continue,
                        _ = tokio::time::sleep(debounce) => break,
                    }
                }
                autosave(&ctx, false).await;
            }
            _ = next_tick(&mut ticker) => {
                autosave(&ctx, false).await;
            }
        }
    }

    debug!("Debouncer stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        DraftDocument, DraftStatus, NewAttachment, FIELD_ADRESSE, FIELD_NOM, FIELD_PRENOM,
        GENERAL_INFO, OBSERVATIONS,
    };
    use crate::mock::{MockFailure, MockGateway};

    fn context(gateway: Arc<MockGateway>) -> Arc<DraftContext> {
        Arc::new(DraftContext::new(gateway, DraftDocument::new(), 16))
    }

    fn fill_identity(ctx: &DraftContext) {
        let mut doc = ctx.lock();
        doc.update_field(GENERAL_INFO, FIELD_NOM, "Jean").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_PRENOM, "Dupont").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_ADRESSE, "1 Rue X").unwrap();
    }

    #[tokio::test]
    async fn test_ineligible_document_is_not_saved() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        ctx.lock().update_field(GENERAL_INFO, FIELD_NOM, "Jean").unwrap();

        assert!(!autosave(&ctx, false).await);
        assert!(!autosave(&ctx, true).await);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_autosave_is_a_no_op() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        assert!(autosave(&ctx, false).await);
        assert!(!autosave(&ctx, false).await);

        assert_eq!(gateway.patch_count(), 1);
        assert_eq!(ctx.lock().status(), DraftStatus::Saved);
    }

    #[tokio::test]
    async fn test_failed_patch_keeps_changes_pending() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        gateway.fail_next_patch(MockFailure::Server(503));
        assert!(!autosave(&ctx, false).await);
        {
            let doc = ctx.lock();
            assert_eq!(doc.status(), DraftStatus::Dirty);
            assert!(doc.has_pending_changes());
            assert_eq!(doc.last_error(), Some(SyncErrorKind::TransientNetworkFailure));
        }
        assert!(ctx.autosave_state().error.is_some());

        assert!(autosave(&ctx, false).await);
        assert!(ctx.autosave_state().error.is_none());
        assert_eq!(ctx.lock().last_error(), None);
    }

    #[tokio::test]
    async fn test_vanished_draft_is_recreated_once() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        fill_identity(&ctx);
        assert!(autosave(&ctx, false).await);
        let first = ctx.lock().draft_id().cloned().unwrap();

        gateway.vanish(&first);
        ctx.lock().update_field(GENERAL_INFO, FIELD_NOM, "Jeanne").unwrap();
        assert!(autosave(&ctx, false).await);

        let second = ctx.lock().draft_id().cloned().unwrap();
        assert_ne!(first, second);
        assert_eq!(gateway.create_count(), 2);
        assert_eq!(gateway.draft_count(), 1);
        assert_eq!(gateway.draft(&second).unwrap().nom.as_deref(), Some("Jeanne"));
        assert_eq!(ctx.lock().status(), DraftStatus::Saved);
    }

    #[tokio::test]
    async fn test_upload_failure_marks_document_dirty() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        fill_identity(&ctx);
        ctx.lock()
            .add_attachments(OBSERVATIONS, vec![NewAttachment::new("a.jpg", "image/jpeg", vec![1])])
            .unwrap();

        gateway.fail_uploads(Some(MockFailure::Server(500)));
        assert!(!autosave(&ctx, false).await);
        {
            let doc = ctx.lock();
            assert_eq!(doc.status(), DraftStatus::Dirty);
            assert_eq!(doc.last_error(), Some(SyncErrorKind::UploadFailure));
            assert!(doc.has_pending_attachments());
        }

        gateway.fail_uploads(None);
        assert!(autosave(&ctx, false).await);
        assert!(!ctx.lock().has_pending_attachments());
        assert_eq!(gateway.upload_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_waits_for_quiet_period() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        let config = AutosaveConfig {
            debounce_ms: 500,
            ..Default::default()
        };
        let debouncer = Debouncer::spawn(ctx.clone(), &config);

        fill_identity(&ctx);
        ctx.edits.notify_one();
        tokio::time::sleep(Duration::from_millis(300)).await;
        ctx.lock().update_field(GENERAL_INFO, FIELD_NOM, "Jeanne").unwrap();
        ctx.edits.notify_one();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.patch_count(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(gateway.create_count(), 1);
        assert_eq!(gateway.patch_count(), 1);

        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick_saves_pending_changes() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        let config = AutosaveConfig {
            interval_ms: Some(10_000),
            ..Default::default()
        };
        let debouncer = Debouncer::spawn(ctx.clone(), &config);

        fill_identity(&ctx);
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(gateway.patch_count(), 1);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(gateway.patch_count(), 1);

        debouncer.shutdown().await;
    }
}
