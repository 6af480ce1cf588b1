//! Attachment reconciler
//!
//! Uploads every slot holding pending photos as one multipart request per
//! slot, then swaps the uploaded pending entries for the server's
//! confirmations. Failed slots keep their pending entries for the next cycle.

use crate::context::DraftContext;
use crate::document::{AttachmentSlot, ConfirmedAttachment};
use crate::error::{Result, SyncError};
use crate::events::LifecycleEvent;
use fieldops_gateway::DraftId;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upload all pending photos of the document to `draft_id`.
///
/// Every slot is attempted even when another fails; the first failure is
/// returned once all uploads have settled.
pub(crate) async fn flush_pending(ctx: &Arc<DraftContext>, draft_id: &DraftId) -> Result<()> {
    let (local_id, batches) = {
        let doc = ctx.lock();
        (doc.local_id(), doc.pending_batches())
    };
    if batches.is_empty() {
        return Ok(());
    }

    let uploads = batches.into_iter().map(|batch| {
        let gateway = ctx.gateway.clone();
        async move {
            debug!(
                draft_id = %draft_id,
                section_id = %batch.upload.section_id,
                files = batch.upload.files.len(),
                "Uploading photos"
            );
            let result = gateway.upload_photos(draft_id, batch.upload).await;
            (batch.slot, batch.handles, result)
        }
    });
    let results = join_all(uploads).await;

    let mut first_error = None;
    let mut released = Vec::new();
    {
        let mut doc = ctx.lock();
        let current = doc.local_id() == local_id && doc.draft_id() == Some(draft_id);

        for (slot, handles, result) in results {
            match result {
                Ok(photos) if current => {
                    info!(
                        draft_id = %draft_id,
                        slot = %slot,
                        count = photos.len(),
                        "Photos confirmed"
                    );
                    let confirmed = photos.into_iter().map(ConfirmedAttachment::from).collect();
                    released.extend(doc.confirm_uploads(&slot, &handles, confirmed));
                }
                Ok(_) => {
                    debug!(
                        draft_id = %draft_id,
                        slot = %slot,
                        "Upload finished for a replaced document"
                    );
                }
                Err(e) => {
                    warn!(draft_id = %draft_id, slot = %slot, error = %e, "Photo upload failed");
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    if !released.is_empty() {
        ctx.emit(LifecycleEvent::PreviewsReleased { preview_urls: released });
    }

    match first_error {
        Some(e) => Err(SyncError::Upload(e)),
        None => Ok(()),
    }
}

/// Delete a confirmed photo remotely, then drop it from the slot
pub(crate) async fn delete_confirmed(
    ctx: &Arc<DraftContext>,
    slot: &AttachmentSlot,
    filename: &str,
) -> Result<()> {
    let draft_id = {
        let doc = ctx.lock();
        if !doc.has_confirmed(slot, filename) {
            return Err(SyncError::UnknownAttachment(filename.to_string()));
        }
        doc.draft_id().cloned().ok_or(SyncError::NoDraft)?
    };

    ctx.gateway.delete_photo(&draft_id, filename).await?;

    let mut doc = ctx.lock();
    if doc.draft_id() == Some(&draft_id) {
        doc.remove_confirmed(slot, filename);
    }
    info!(draft_id = %draft_id, filename, "Photo deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Attachment, DraftDocument, NewAttachment, DESCRIPTION, OBSERVATIONS};
    use crate::mock::{MockFailure, MockGateway};

    fn context_with_draft(gateway: Arc<MockGateway>) -> (Arc<DraftContext>, DraftId) {
        let id = gateway.seed_draft();
        let mut doc = DraftDocument::new();
        doc.attach_draft(id.clone());
        (Arc::new(DraftContext::new(gateway, doc, 16)), id)
    }

    fn jpeg(name: &str) -> NewAttachment {
        NewAttachment::new(name, "image/jpeg", name.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_one_upload_per_slot() {
        let gateway = Arc::new(MockGateway::new());
        let (ctx, id) = context_with_draft(gateway.clone());
        {
            let mut doc = ctx.lock();
            doc.add_attachments(OBSERVATIONS, vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
            doc.add_attachments(DESCRIPTION, vec![jpeg("c.jpg")]).unwrap();
            doc.set_profile_photo(jpeg("me.jpg")).unwrap();
        }

        flush_pending(&ctx, &id).await.unwrap();

        assert_eq!(gateway.upload_count(), 3);
        let doc = ctx.lock();
        assert!(!doc.has_pending_attachments());
        assert_eq!(doc.section(OBSERVATIONS).unwrap().attachments.len(), 2);
        assert!(matches!(doc.profile(), Some(Attachment::Confirmed(c)) if c.is_profile));
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_pending() {
        let gateway = Arc::new(MockGateway::new());
        let (ctx, id) = context_with_draft(gateway.clone());
        ctx.lock()
            .add_attachments(OBSERVATIONS, vec![jpeg("a.jpg")])
            .unwrap();

        gateway.fail_uploads(Some(MockFailure::Server(500)));
        let err = flush_pending(&ctx, &id).await.unwrap_err();
        assert!(matches!(err, SyncError::Upload(_)));
        assert!(ctx.lock().has_pending_attachments());

        gateway.fail_uploads(None);
        flush_pending(&ctx, &id).await.unwrap();
        assert!(!ctx.lock().has_pending_attachments());
    }

    #[tokio::test]
    async fn test_previews_released_after_confirmation() {
        let gateway = Arc::new(MockGateway::new());
        let (ctx, id) = context_with_draft(gateway.clone());
        let mut events = ctx.subscribe();
        ctx.lock()
            .add_attachments(OBSERVATIONS, vec![jpeg("a.jpg").with_preview("blob:a")])
            .unwrap();

        flush_pending(&ctx, &id).await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            LifecycleEvent::PreviewsReleased {
                preview_urls: vec!["blob:a".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_delete_confirmed_after_remote_success() {
        let gateway = Arc::new(MockGateway::new());
        let (ctx, id) = context_with_draft(gateway.clone());
        ctx.lock()
            .add_attachments(OBSERVATIONS, vec![jpeg("a.jpg")])
            .unwrap();
        flush_pending(&ctx, &id).await.unwrap();

        let filename = ctx.lock().section(OBSERVATIONS).unwrap().attachments[0]
            .filename()
            .unwrap()
            .to_string();
        let slot = AttachmentSlot::Section(OBSERVATIONS.to_string());

        delete_confirmed(&ctx, &slot, &filename).await.unwrap();

        assert!(ctx.lock().section(OBSERVATIONS).unwrap().attachments.is_empty());
        assert_eq!(gateway.delete_photo_count(), 1);
        assert!(matches!(
            delete_confirmed(&ctx, &slot, &filename).await,
            Err(SyncError::UnknownAttachment(_))
        ));
    }
}
