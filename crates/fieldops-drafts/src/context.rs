//! State shared between a session handle, its debouncer and in-flight tasks

use crate::document::DraftDocument;
use crate::error::SyncError;
use crate::events::{AutosaveState, LifecycleEvent};
use crate::gateway::DraftGateway;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch, Notify};
use tracing::debug;

pub(crate) struct DraftContext {
    pub gateway: Arc<dyn DraftGateway>,
    /// Never held across an `.await`
    document: Mutex<DraftDocument>,
    autosave: watch::Sender<AutosaveState>,
    events: broadcast::Sender<LifecycleEvent>,
    /// Serializes save, finalize and discard cycles
    pub save_queue: tokio::sync::Mutex<()>,
    /// Wakes the debouncer on every edit
    pub edits: Notify,
}

impl DraftContext {
    pub fn new(
        gateway: Arc<dyn DraftGateway>,
        document: DraftDocument,
        event_capacity: usize,
    ) -> Self {
        let (autosave, _) = watch::channel(AutosaveState {
            last_saved: document.last_saved(),
            ..Default::default()
        });
        let (events, _) = broadcast::channel(event_capacity.max(1));

        Self {
            gateway,
            document: Mutex::new(document),
            autosave,
            events,
            save_queue: tokio::sync::Mutex::new(()),
            edits: Notify::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, DraftDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a fresh document. The old one is dropped outside the lock.
    pub fn reset(&self) -> DraftDocument {
        let mut doc = self.lock();
        std::mem::replace(&mut *doc, DraftDocument::new())
    }

    pub fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No lifecycle event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn watch_autosave(&self) -> watch::Receiver<AutosaveState> {
        self.autosave.subscribe()
    }

    pub fn autosave_state(&self) -> AutosaveState {
        self.autosave.borrow().clone()
    }

    pub fn publish(&self, update: impl FnOnce(&mut AutosaveState)) {
        self.autosave.send_modify(update);
    }

    pub fn publish_error(&self, err: &SyncError) {
        let message = err.to_string();
        self.publish(|state| {
            state.saving = false;
            state.error = Some(message);
        });
    }

    pub fn reset_autosave(&self) {
        self.autosave.send_replace(AutosaveState::default());
    }
}
