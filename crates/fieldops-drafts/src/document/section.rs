//! Report sections and their fields

use super::attachment::Attachment;
use serde::{Deserialize, Serialize};

/// Section carrying the identity fields that gate draft creation
pub const GENERAL_INFO: &str = "general_info";
pub const DESCRIPTION: &str = "description";
pub const OBSERVATIONS: &str = "observations";

pub const FIELD_NOM: &str = "nom";
pub const FIELD_PRENOM: &str = "prenom";
pub const FIELD_ADRESSE: &str = "adresse";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_OBSERVATIONS: &str = "observations";
/// Single free-text field of a user-added section
pub const FIELD_CONTENT: &str = "content";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub label: String,
    pub value: String,
    pub required: bool,
}

impl Field {
    fn new(id: &str, label: &str, required: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            value: String::new(),
            required,
        }
    }

    /// Non-empty once trimmed
    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Seeded from the report template, or added by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Template,
    Custom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub kind: SectionKind,
    pub fields: Vec<Field>,
    pub attachments: Vec<Attachment>,
    pub collapsed: bool,
}

impl Section {
    fn template(id: &str, title: &str, required: bool, fields: Vec<Field>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            required,
            kind: SectionKind::Template,
            fields,
            attachments: Vec::new(),
            collapsed: false,
        }
    }

    /// A user-added section with one free-text field
    pub fn custom(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            required: false,
            kind: SectionKind::Custom,
            fields: vec![Field::new(FIELD_CONTENT, "Contenu", false)],
            attachments: Vec::new(),
            collapsed: false,
        }
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub(crate) fn field_mut(&mut self, field_id: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    /// Value of a field, empty when absent
    pub fn value(&self, field_id: &str) -> &str {
        self.field(field_id).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn has_pending_attachments(&self) -> bool {
        self.attachments.iter().any(Attachment::is_pending)
    }
}

/// Sections every new report starts with
pub fn template_sections() -> Vec<Section> {
    vec![
        Section::template(
            GENERAL_INFO,
            "Informations générales",
            true,
            vec![
                Field::new(FIELD_NOM, "Nom", true),
                Field::new(FIELD_PRENOM, "Prénom", true),
                Field::new(FIELD_ADRESSE, "Adresse", true),
            ],
        ),
        Section::template(
            DESCRIPTION,
            "Description",
            false,
            vec![Field::new(FIELD_DESCRIPTION, "Description", false)],
        ),
        Section::template(
            OBSERVATIONS,
            "Observations",
            false,
            vec![Field::new(FIELD_OBSERVATIONS, "Observations", false)],
        ),
    ]
}
