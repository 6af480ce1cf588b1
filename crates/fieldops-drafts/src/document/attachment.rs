//! Photo attachments held by a draft

use fieldops_gateway::{PhotoRecord, UploadFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Slot id used for the profile photo in uploads
pub const PROFILE_SLOT_ID: &str = "profile";

/// Handle to a file held locally until the server acknowledges it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalHandle(Uuid);

impl LocalHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A file picked by the user, not yet known to the server
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttachment {
    pub handle: LocalHandle,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Host-side preview (e.g. an object URL) to release once confirmed
    pub preview_url: Option<String>,
}

impl PendingAttachment {
    pub(crate) fn to_upload(&self) -> UploadFile {
        UploadFile {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

/// A photo acknowledged by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedAttachment {
    pub filename: String,
    pub url: Option<String>,
    pub original_name: Option<String>,
    pub section_id: Option<String>,
    pub is_profile: bool,
}

impl From<PhotoRecord> for ConfirmedAttachment {
    fn from(photo: PhotoRecord) -> Self {
        Self {
            filename: photo.filename,
            url: photo.url,
            original_name: photo.original_name,
            section_id: photo.section_id,
            is_profile: photo.is_profile,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Pending(PendingAttachment),
    Confirmed(ConfirmedAttachment),
}

impl Attachment {
    pub fn is_pending(&self) -> bool {
        matches!(self, Attachment::Pending(_))
    }

    pub fn handle(&self) -> Option<LocalHandle> {
        match self {
            Attachment::Pending(p) => Some(p.handle),
            Attachment::Confirmed(_) => None,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Attachment::Pending(_) => None,
            Attachment::Confirmed(c) => Some(&c.filename),
        }
    }
}

/// Input for adding a photo to the document
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub preview_url: Option<String>,
}

impl NewAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
            preview_url: None,
        }
    }

    pub fn with_preview(mut self, preview_url: impl Into<String>) -> Self {
        self.preview_url = Some(preview_url.into());
        self
    }

    pub(crate) fn into_pending(self) -> PendingAttachment {
        PendingAttachment {
            handle: LocalHandle::new(),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
            preview_url: self.preview_url,
        }
    }
}

/// Where an attachment lives: a section, or the profile slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    Section(String),
    Profile,
}

impl AttachmentSlot {
    /// `section_id` sent with the multipart upload
    pub fn upload_id(&self) -> &str {
        match self {
            AttachmentSlot::Section(id) => id,
            AttachmentSlot::Profile => PROFILE_SLOT_ID,
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, AttachmentSlot::Profile)
    }
}

impl fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.upload_id())
    }
}

/// Merge server confirmations into a slot's attachment list.
///
/// Pending entries whose handle is in `uploaded` are replaced in place, in
/// upload order. Confirmed entries and pending entries added after the
/// upload started are left alone. Confirmations with no pending entry left to
/// replace (removed locally mid-upload) are appended. Uploaded entries the
/// server returned no record for were stored all the same and leave the
/// list. Returns the preview URLs of the replaced and dropped entries.
pub(crate) fn merge_confirmed(
    attachments: &mut Vec<Attachment>,
    uploaded: &[LocalHandle],
    confirmed: Vec<ConfirmedAttachment>,
) -> Vec<String> {
    let mut released = Vec::new();
    let mut leftovers = Vec::new();
    let confirmed_count = confirmed.len();

    for (handle, photo) in uploaded.iter().zip(confirmed) {
        let position = attachments
            .iter()
            .position(|a| a.handle() == Some(*handle));

        match position {
            Some(index) => {
                let previous =
                    std::mem::replace(&mut attachments[index], Attachment::Confirmed(photo));
                released.extend(preview_of(previous));
            }
            None => leftovers.push(Attachment::Confirmed(photo)),
        }
    }

    let unconfirmed = uploaded.get(confirmed_count..).unwrap_or_default();
    attachments.retain_mut(|a| match a {
        Attachment::Pending(p) if unconfirmed.contains(&p.handle) => {
            released.extend(p.preview_url.take());
            false
        }
        _ => true,
    });

    attachments.extend(leftovers);
    released
}

fn preview_of(attachment: Attachment) -> Option<String> {
    match attachment {
        Attachment::Pending(PendingAttachment { preview_url, .. }) => preview_url,
        Attachment::Confirmed(_) => None,
    }
}
