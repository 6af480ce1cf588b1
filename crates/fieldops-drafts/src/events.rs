//! Lifecycle events and autosave status published to the host UI
//!
//! Nothing inside the engine consumes these; hosts use them to refresh draft
//! counters, badges and "saved at" indicators.

use chrono::{DateTime, Utc};
use fieldops_gateway::DraftId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created {
        draft_id: DraftId,
    },
    Saved {
        draft_id: DraftId,
        saved_at: DateTime<Utc>,
    },
    Finalized {
        draft_id: DraftId,
    },
    Discarded {
        draft_id: Option<DraftId>,
    },
    /// Local previews of now-confirmed photos can be freed
    PreviewsReleased {
        preview_urls: Vec<String>,
    },
}

/// Autosave indicator state. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutosaveState {
    pub saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LifecycleEvent::Created {
            draft_id: DraftId::from("d-1"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "created");
        assert_eq!(json["draft_id"], "d-1");

        let discarded = serde_json::to_value(LifecycleEvent::Discarded { draft_id: None }).unwrap();
        assert_eq!(discarded["type"], "discarded");
        assert!(discarded["draft_id"].is_null());
    }
}
