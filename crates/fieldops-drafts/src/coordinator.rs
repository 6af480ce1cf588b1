//! Creation coordinator
//!
//! Resolves the remote draft id for a document, creating the draft at most
//! once. Concurrent callers that arrive while a creation is in flight await
//! the same shared result instead of issuing a second `POST`.
//!
//! The creation runs as its own task so that a caller giving up (a dropped
//! debounce cycle, a cancelled command) does not abort a request the server
//! may already be processing.

use crate::context::DraftContext;
use crate::document::CreationFuture;
use crate::error::{SyncError, SyncErrorKind};
use crate::events::LifecycleEvent;
use crate::gate;
use fieldops_gateway::{DraftId, GatewayError};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Return the document's draft id, creating the remote draft when allowed.
///
/// `None` is not an error: the document is not eligible yet, no credential is
/// available, or the creation failed and will be retried on the next trigger.
pub(crate) async fn ensure_draft(ctx: &Arc<DraftContext>, force_creation: bool) -> Option<DraftId> {
    let creation: CreationFuture = {
        let mut doc = ctx.lock();

        if let Some(id) = doc.draft_id() {
            return Some(id.clone());
        }
        if doc.status().is_terminal() {
            return None;
        }
        if !gate::is_eligible(&doc, force_creation) {
            debug!(missing = ?gate::missing_required_fields(&doc), "Draft creation gated");
            return None;
        }

        match &doc.creation_in_flight {
            Some(in_flight) => {
                debug!("Joining in-flight draft creation");
                in_flight.clone()
            }
            None => {
                let local_id = doc.local_id();
                let task = tokio::spawn(create_draft(ctx.clone(), local_id));
                let owner = ctx.clone();
                let shared = async move {
                    match task.await {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(error = %e, "Draft creation task failed");
                            abandon_creation(&owner, local_id);
                            None
                        }
                    }
                }
                .boxed()
                .shared();

                doc.begin_creation();
                doc.creation_in_flight = Some(shared.clone());
                shared
            }
        }
    };

    creation.await
}

/// Clear the in-flight marker of a creation task that panicked or was
/// cancelled before it could settle the document itself
fn abandon_creation(ctx: &DraftContext, local_id: Uuid) {
    let mut doc = ctx.lock();
    if doc.local_id() != local_id {
        return;
    }
    doc.creation_in_flight = None;
    doc.creation_failed(Some(SyncErrorKind::TransientNetworkFailure));
}

enum Outcome {
    Attached(DraftId),
    Orphaned(DraftId),
    Failed,
}

async fn create_draft(ctx: Arc<DraftContext>, local_id: Uuid) -> Option<DraftId> {
    debug!("POST /searches/draft");
    let result = ctx.gateway.create_draft().await;

    let outcome = {
        let mut doc = ctx.lock();
        let current = doc.local_id() == local_id;
        if current {
            doc.creation_in_flight = None;
        }

        match result {
            Ok(id) if current => {
                doc.attach_draft(id.clone());
                Outcome::Attached(id)
            }
            Ok(id) => Outcome::Orphaned(id),
            Err(GatewayError::AuthMissing) => {
                debug!("No credential, draft creation skipped");
                if current {
                    doc.creation_failed(None);
                }
                Outcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "Draft creation failed");
                if current {
                    doc.creation_failed(Some(SyncErrorKind::TransientNetworkFailure));
                }
                let err = SyncError::from(e);
                if current {
                    ctx.publish_error(&err);
                }
                Outcome::Failed
            }
        }
    };

    match outcome {
        Outcome::Attached(id) => {
            info!(draft_id = %id, "Draft created");
            ctx.emit(LifecycleEvent::Created { draft_id: id.clone() });
            Some(id)
        }
        Outcome::Orphaned(id) => {
            // The document was finalized or discarded while the POST was in flight
            warn!(draft_id = %id, "Deleting draft created for a reset document");
            if let Err(e) = ctx.gateway.delete_draft(&id).await {
                warn!(draft_id = %id, error = %e, "Failed to delete orphan draft");
            }
            None
        }
        Outcome::Failed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        DraftDocument, DraftStatus, FIELD_ADRESSE, FIELD_NOM, FIELD_PRENOM, GENERAL_INFO,
    };
    use crate::gateway::DraftGateway;
    use crate::mock::MockGateway;
    use async_trait::async_trait;
    use fieldops_gateway::{DraftPatch, DraftRecord, PhotoRecord, UploadBatch};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

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
    async fn test_existing_id_needs_no_network() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        ctx.lock().attach_draft(DraftId::from("d-1"));

        assert_eq!(ensure_draft(&ctx, false).await, Some(DraftId::from("d-1")));
        assert_eq!(gateway.create_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_creation() {
        let gateway = Arc::new(MockGateway::new().with_latency(Duration::from_millis(50)));
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        let (a, b, c) = tokio::join!(
            ensure_draft(&ctx, false),
            ensure_draft(&ctx, false),
            ensure_draft(&ctx, true),
        );

        assert_eq!(gateway.create_count(), 1);
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(ctx.lock().creation_in_flight.is_none());
        assert_eq!(ctx.lock().status(), DraftStatus::Dirty);
    }

    #[tokio::test]
    async fn test_failed_creation_can_be_retried() {
        let gateway = Arc::new(MockGateway::new());
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        gateway.fail_next_create();
        assert_eq!(ensure_draft(&ctx, false).await, None);
        {
            let doc = ctx.lock();
            assert_eq!(doc.status(), DraftStatus::Eligible);
            assert_eq!(doc.last_error(), Some(SyncErrorKind::TransientNetworkFailure));
            assert!(doc.creation_in_flight.is_none());
        }

        assert!(ensure_draft(&ctx, false).await.is_some());
        assert_eq!(gateway.create_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_is_silent() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_authenticated(false);
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        assert_eq!(ensure_draft(&ctx, false).await, None);
        assert_eq!(ctx.lock().last_error(), None);
        assert!(ctx.autosave_state().error.is_none());
    }

    /// Panics inside the first `create_draft`, then delegates to the mock
    struct PanickingCreate {
        inner: MockGateway,
        panicked: AtomicBool,
    }

    #[async_trait]
    impl DraftGateway for PanickingCreate {
        async fn create_draft(&self) -> Result<DraftId, GatewayError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("create_draft blew up");
            }
            self.inner.create_draft().await
        }

        async fn update_draft(&self, id: &DraftId, patch: &DraftPatch) -> Result<(), GatewayError> {
            self.inner.update_draft(id, patch).await
        }

        async fn upload_photos(
            &self,
            id: &DraftId,
            batch: UploadBatch,
        ) -> Result<Vec<PhotoRecord>, GatewayError> {
            self.inner.upload_photos(id, batch).await
        }

        async fn delete_photo(&self, id: &DraftId, filename: &str) -> Result<(), GatewayError> {
            self.inner.delete_photo(id, filename).await
        }

        async fn delete_draft(&self, id: &DraftId) -> Result<(), GatewayError> {
            self.inner.delete_draft(id).await
        }

        async fn list_drafts(&self) -> Result<Vec<DraftRecord>, GatewayError> {
            self.inner.list_drafts().await
        }

        async fn get_draft(&self, id: &DraftId) -> Result<DraftRecord, GatewayError> {
            self.inner.get_draft(id).await
        }
    }

    #[tokio::test]
    async fn test_panicked_creation_releases_in_flight_marker() {
        let gateway = Arc::new(PanickingCreate {
            inner: MockGateway::new(),
            panicked: AtomicBool::new(false),
        });
        let ctx = Arc::new(DraftContext::new(gateway.clone(), DraftDocument::new(), 16));
        fill_identity(&ctx);

        assert_eq!(ensure_draft(&ctx, false).await, None);
        {
            let doc = ctx.lock();
            assert!(doc.creation_in_flight.is_none());
            assert_eq!(doc.status(), DraftStatus::Eligible);
            assert_eq!(doc.last_error(), Some(SyncErrorKind::TransientNetworkFailure));
        }

        let retried = ensure_draft(&ctx, false).await;
        assert!(retried.is_some());
        assert_eq!(gateway.inner.create_count(), 1);
        assert_eq!(ctx.lock().draft_id(), retried.as_ref());
        assert_eq!(ctx.lock().status(), DraftStatus::Dirty);
    }

    #[tokio::test]
    async fn test_creation_after_reset_deletes_orphan() {
        let gateway = Arc::new(MockGateway::new().with_latency(Duration::from_millis(50)));
        let ctx = context(gateway.clone());
        fill_identity(&ctx);

        let pending = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ensure_draft(&ctx, false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(ctx.reset());

        assert_eq!(pending.await.unwrap(), None);
        assert!(ctx.lock().draft_id().is_none());
        assert_eq!(gateway.delete_draft_count(), 1);
        assert_eq!(gateway.draft_count(), 0);
    }
}
