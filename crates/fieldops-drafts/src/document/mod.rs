//! In-memory draft document
//!
//! The document is the single source of truth for one editor session: ordered
//! sections with their fields and photos, the profile photo, the remote draft
//! id once created, and the lifecycle status. All mutation goes through
//! methods here so that every edit bumps the revision counter the scheduler
//! uses to decide whether a save is due.

mod attachment;
pub mod projection;
mod section;

pub use attachment::{
    Attachment, AttachmentSlot, ConfirmedAttachment, LocalHandle, NewAttachment, PendingAttachment,
    PROFILE_SLOT_ID,
};
pub use section::{
    template_sections, Field, Section, SectionKind, DESCRIPTION, FIELD_ADRESSE, FIELD_CONTENT,
    FIELD_DESCRIPTION, FIELD_NOM, FIELD_OBSERVATIONS, FIELD_PRENOM, GENERAL_INFO, OBSERVATIONS,
};

use crate::error::{Result, SyncError, SyncErrorKind};
use chrono::{DateTime, Utc};
use fieldops_gateway::{DraftId, DraftRecord, UploadBatch};
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Shared result of the one outstanding "create draft" call
pub(crate) type CreationFuture = Shared<BoxFuture<'static, Option<DraftId>>>;

/// Lifecycle status of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    /// Fresh document, untouched
    None,
    /// User typed something, no remote draft yet
    Eligible,
    /// Remote creation in flight
    Creating,
    /// Remote draft exists, local changes not saved
    Dirty,
    /// Save cycle in flight
    Saving,
    /// Remote draft matches local state
    Saved,
    Finalized,
    Discarded,
}

impl DraftStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DraftStatus::Finalized | DraftStatus::Discarded)
    }
}

/// Point-in-time copy of the document for the host UI
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub draft_id: Option<DraftId>,
    pub status: DraftStatus,
    pub sections: Vec<Section>,
    pub profile: Option<Attachment>,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_error: Option<SyncErrorKind>,
    pub has_pending_changes: bool,
    pub has_user_interaction: bool,
}

impl DocumentSnapshot {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}

/// Files of one slot ready for a multipart upload
pub(crate) struct PendingBatch {
    pub slot: AttachmentSlot,
    pub handles: Vec<LocalHandle>,
    pub upload: UploadBatch,
}

pub struct DraftDocument {
    /// Identity of this in-memory document; changes on every reset
    local_id: Uuid,
    draft_id: Option<DraftId>,
    status: DraftStatus,
    sections: Vec<Section>,
    profile: Option<Attachment>,
    /// Bumped on every content edit
    revision: u64,
    /// Revision last patched to the current remote draft (`None` before the first patch)
    saved_revision: Option<u64>,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<SyncErrorKind>,
    pub(crate) creation_in_flight: Option<CreationFuture>,
}

impl fmt::Debug for DraftDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftDocument")
            .field("local_id", &self.local_id)
            .field("draft_id", &self.draft_id)
            .field("status", &self.status)
            .field("sections", &self.sections.len())
            .field("revision", &self.revision)
            .field("saved_revision", &self.saved_revision)
            .field("creation_in_flight", &self.creation_in_flight.is_some())
            .finish()
    }
}

impl Default for DraftDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftDocument {
    /// Empty document seeded from the report template
    pub fn new() -> Self {
        Self {
            local_id: Uuid::new_v4(),
            draft_id: None,
            status: DraftStatus::None,
            sections: template_sections(),
            profile: None,
            revision: 0,
            saved_revision: Some(0),
            last_saved: None,
            last_error: None,
            creation_in_flight: None,
        }
    }

    /// Rebuild a document from a stored draft.
    ///
    /// Photos go to the section named by their `section_id`; a section id
    /// the template does not know becomes a custom section, photos without
    /// one land in the description section. The profile photo fills the
    /// profile slot.
    pub fn from_record(record: &DraftRecord) -> Self {
        let mut doc = Self::new();

        doc.set_value(GENERAL_INFO, FIELD_NOM, record.nom.as_deref());
        doc.set_value(GENERAL_INFO, FIELD_PRENOM, record.prenom.as_deref());
        doc.set_value(GENERAL_INFO, FIELD_ADRESSE, record.location.as_deref());
        doc.set_value(DESCRIPTION, FIELD_DESCRIPTION, record.description.as_deref());
        doc.set_value(OBSERVATIONS, FIELD_OBSERVATIONS, record.observations.as_deref());

        for photo in record.photos() {
            let confirmed = ConfirmedAttachment::from(photo.clone());
            if confirmed.is_profile {
                doc.profile = Some(Attachment::Confirmed(confirmed));
                continue;
            }

            let section_id = match photo.section_id.as_deref() {
                Some(id) if !id.is_empty() && id != PROFILE_SLOT_ID => id.to_string(),
                _ => DESCRIPTION.to_string(),
            };
            if doc.section(&section_id).is_none() {
                doc.sections.push(Section::custom(section_id.clone(), section_id.clone()));
            }
            if let Some(section) = doc.section_mut(&section_id) {
                section.attachments.push(Attachment::Confirmed(confirmed));
            }
        }

        doc.draft_id = Some(record.id.clone());
        doc.status = DraftStatus::Saved;
        doc
    }

    fn set_value(&mut self, section_id: &str, field_id: &str, value: Option<&str>) {
        if let Some(field) = self
            .section_mut(section_id)
            .and_then(|s| s.field_mut(field_id))
        {
            field.value = value.unwrap_or_default().to_string();
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn local_id(&self) -> Uuid {
        self.local_id
    }

    pub fn draft_id(&self) -> Option<&DraftId> {
        self.draft_id.as_ref()
    }

    pub fn status(&self) -> DraftStatus {
        self.status
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    fn section_mut(&mut self, section_id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == section_id)
    }

    pub fn profile(&self) -> Option<&Attachment> {
        self.profile.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn last_error(&self) -> Option<SyncErrorKind> {
        self.last_error
    }

    pub fn has_pending_attachments(&self) -> bool {
        self.sections.iter().any(Section::has_pending_attachments)
            || self.profile.as_ref().is_some_and(Attachment::is_pending)
    }

    /// Field edits not yet patched, or photos not yet uploaded
    pub fn has_pending_changes(&self) -> bool {
        self.saved_revision != Some(self.revision) || self.has_pending_attachments()
    }

    pub fn has_user_interaction(&self) -> bool {
        self.status != DraftStatus::None
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            draft_id: self.draft_id.clone(),
            status: self.status,
            sections: self.sections.clone(),
            profile: self.profile.clone(),
            last_saved: self.last_saved,
            last_error: self.last_error,
            has_pending_changes: self.has_pending_changes(),
            has_user_interaction: self.has_user_interaction(),
        }
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Set a field value and mark the document dirty
    pub fn update_field(
        &mut self,
        section_id: &str,
        field_id: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.ensure_open()?;
        let section = self
            .section_mut(section_id)
            .ok_or_else(|| SyncError::UnknownSection(section_id.to_string()))?;
        let field = section
            .field_mut(field_id)
            .ok_or_else(|| SyncError::UnknownField {
                section: section_id.to_string(),
                field: field_id.to_string(),
            })?;

        field.value = value.into();
        self.record_edit();
        Ok(())
    }

    /// Append a user-defined section, returning its id
    pub fn add_section(&mut self, title: impl Into<String>) -> Result<String> {
        self.ensure_open()?;
        let id = format!("custom_{}", Uuid::new_v4().simple());
        self.sections.push(Section::custom(id.clone(), title));
        self.record_edit();
        Ok(id)
    }

    /// Remove a user-defined section and its local photos
    pub fn remove_section(&mut self, section_id: &str) -> Result<Section> {
        self.ensure_open()?;
        let index = self
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| SyncError::UnknownSection(section_id.to_string()))?;
        if self.sections[index].required {
            return Err(SyncError::RequiredSection(section_id.to_string()));
        }

        let removed = self.sections.remove(index);
        self.record_edit();
        Ok(removed)
    }

    /// Collapse state is presentation only; it does not dirty the document
    pub fn set_collapsed(&mut self, section_id: &str, collapsed: bool) -> Result<()> {
        let section = self
            .section_mut(section_id)
            .ok_or_else(|| SyncError::UnknownSection(section_id.to_string()))?;
        section.collapsed = collapsed;
        Ok(())
    }

    /// Queue photos for upload into a section
    pub fn add_attachments(
        &mut self,
        section_id: &str,
        files: Vec<NewAttachment>,
    ) -> Result<Vec<LocalHandle>> {
        self.ensure_open()?;
        let section = self
            .section_mut(section_id)
            .ok_or_else(|| SyncError::UnknownSection(section_id.to_string()))?;

        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            let pending = file.into_pending();
            handles.push(pending.handle);
            section.attachments.push(Attachment::Pending(pending));
        }

        if !handles.is_empty() {
            self.record_edit();
        }
        Ok(handles)
    }

    /// Replace the profile photo; the new one is uploaded on the next save
    pub fn set_profile_photo(&mut self, file: NewAttachment) -> Result<LocalHandle> {
        self.ensure_open()?;
        let pending = file.into_pending();
        let handle = pending.handle;
        self.profile = Some(Attachment::Pending(pending));
        self.record_edit();
        Ok(handle)
    }

    /// Drop a photo that was never uploaded. Returns its preview URL, if any.
    pub fn remove_pending_attachment(&mut self, handle: LocalHandle) -> Result<Option<String>> {
        self.ensure_open()?;

        if self.profile.as_ref().and_then(Attachment::handle) == Some(handle) {
            let removed = self.profile.take();
            self.record_edit();
            return Ok(preview_of(removed));
        }

        for section in &mut self.sections {
            let position = section
                .attachments
                .iter()
                .position(|a| a.handle() == Some(handle));
            if let Some(index) = position {
                let removed = section.attachments.remove(index);
                self.record_edit();
                return Ok(preview_of(Some(removed)));
            }
        }

        Err(SyncError::UnknownAttachment(handle.to_string()))
    }

    /// Whether a confirmed photo with this file name lives in the slot
    pub fn has_confirmed(&self, slot: &AttachmentSlot, filename: &str) -> bool {
        match slot {
            AttachmentSlot::Profile => self
                .profile
                .as_ref()
                .and_then(Attachment::filename)
                == Some(filename),
            AttachmentSlot::Section(id) => self
                .section(id)
                .is_some_and(|s| s.attachments.iter().any(|a| a.filename() == Some(filename))),
        }
    }

    /// Remove a confirmed photo once the server deleted it
    pub(crate) fn remove_confirmed(&mut self, slot: &AttachmentSlot, filename: &str) -> bool {
        match slot {
            AttachmentSlot::Profile => {
                if self.profile.as_ref().and_then(Attachment::filename) == Some(filename) {
                    self.profile = None;
                    return true;
                }
                false
            }
            AttachmentSlot::Section(id) => match self.section_mut(id) {
                Some(section) => {
                    let before = section.attachments.len();
                    section.attachments.retain(|a| a.filename() != Some(filename));
                    section.attachments.len() != before
                }
                None => false,
            },
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(SyncError::DocumentClosed);
        }
        Ok(())
    }

    fn record_edit(&mut self) {
        self.revision += 1;
        self.status = match self.status {
            DraftStatus::Creating => DraftStatus::Creating,
            _ if self.draft_id.is_some() => DraftStatus::Dirty,
            _ => DraftStatus::Eligible,
        };
    }

    // =========================================================================
    // Lifecycle transitions
    // =========================================================================

    pub(crate) fn begin_creation(&mut self) {
        if matches!(self.status, DraftStatus::None | DraftStatus::Eligible) {
            self.status = DraftStatus::Creating;
        }
    }

    pub(crate) fn creation_failed(&mut self, kind: Option<SyncErrorKind>) {
        if self.status == DraftStatus::Creating {
            self.status = DraftStatus::Eligible;
        }
        if kind.is_some() {
            self.last_error = kind;
        }
    }

    /// A fresh remote draft starts dirty so its first autosave is not skipped
    pub(crate) fn attach_draft(&mut self, id: DraftId) {
        self.draft_id = Some(id);
        self.saved_revision = None;
        if matches!(
            self.status,
            DraftStatus::None | DraftStatus::Eligible | DraftStatus::Creating | DraftStatus::Saved
        ) {
            self.status = DraftStatus::Dirty;
        }
    }

    /// The remote draft is gone; the next creation replaces it
    pub(crate) fn forget_draft(&mut self) {
        self.draft_id = None;
        self.saved_revision = None;
    }

    pub(crate) fn begin_save(&mut self) {
        self.status = DraftStatus::Saving;
        self.last_error = None;
    }

    /// Fields up to `revision` are stored remotely
    pub(crate) fn fields_saved(&mut self, revision: u64) {
        self.saved_revision = Some(revision);
    }

    pub(crate) fn finish_save(&mut self, at: DateTime<Utc>) {
        self.last_saved = Some(at);
        if self.status.is_terminal() {
            return;
        }
        self.status = if self.has_pending_changes() {
            DraftStatus::Dirty
        } else {
            DraftStatus::Saved
        };
    }

    /// `None` for failures that are absorbed silently
    pub(crate) fn fail_save(&mut self, kind: Option<SyncErrorKind>) {
        if kind.is_some() {
            self.last_error = kind;
        }
        if matches!(self.status, DraftStatus::Saving | DraftStatus::Saved) {
            self.status = DraftStatus::Dirty;
        }
    }

    /// Record a failure that leaves the lifecycle status unchanged
    pub(crate) fn record_error(&mut self, kind: SyncErrorKind) {
        self.last_error = Some(kind);
    }

    pub(crate) fn close(&mut self, status: DraftStatus) {
        self.status = status;
    }

    // =========================================================================
    // Attachment reconciliation
    // =========================================================================

    /// One batch per slot holding pending photos, profile slot first
    pub(crate) fn pending_batches(&self) -> Vec<PendingBatch> {
        let mut batches = Vec::new();

        if let Some(Attachment::Pending(pending)) = &self.profile {
            batches.push(PendingBatch {
                slot: AttachmentSlot::Profile,
                handles: vec![pending.handle],
                upload: UploadBatch {
                    section_id: PROFILE_SLOT_ID.to_string(),
                    is_profile: true,
                    files: vec![pending.to_upload()],
                },
            });
        }

        for section in &self.sections {
            let pending: Vec<&PendingAttachment> = section
                .attachments
                .iter()
                .filter_map(|a| match a {
                    Attachment::Pending(p) => Some(p),
                    Attachment::Confirmed(_) => None,
                })
                .collect();
            if pending.is_empty() {
                continue;
            }

            batches.push(PendingBatch {
                slot: AttachmentSlot::Section(section.id.clone()),
                handles: pending.iter().map(|p| p.handle).collect(),
                upload: UploadBatch {
                    section_id: section.id.clone(),
                    is_profile: false,
                    files: pending.iter().map(|p| p.to_upload()).collect(),
                },
            });
        }

        batches
    }

    /// Swap uploaded pending photos for their confirmations.
    /// Returns preview URLs that can be released.
    pub(crate) fn confirm_uploads(
        &mut self,
        slot: &AttachmentSlot,
        handles: &[LocalHandle],
        confirmed: Vec<ConfirmedAttachment>,
    ) -> Vec<String> {
        match slot {
            AttachmentSlot::Profile => {
                let current = self.profile.as_ref().and_then(Attachment::handle);
                match (current, confirmed.into_iter().next()) {
                    (Some(handle), Some(photo)) if handles.contains(&handle) => {
                        let previous = self.profile.replace(Attachment::Confirmed(photo));
                        preview_of(previous).into_iter().collect()
                    }
                    // Stored without a record coming back
                    (Some(handle), None) if handles.contains(&handle) => {
                        preview_of(self.profile.take()).into_iter().collect()
                    }
                    // Replaced or removed while uploading: the newer choice wins
                    _ => Vec::new(),
                }
            }
            AttachmentSlot::Section(id) => match self.section_mut(id) {
                Some(section) => {
                    attachment::merge_confirmed(&mut section.attachments, handles, confirmed)
                }
                None => Vec::new(),
            },
        }
    }
}

fn preview_of(attachment: Option<Attachment>) -> Option<String> {
    match attachment {
        Some(Attachment::Pending(p)) => p.preview_url,
        _ => None,
    }
}
