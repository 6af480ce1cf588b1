//! Projection of the sectioned document onto the flat remote record

use super::section::{
    Section, SectionKind, DESCRIPTION, FIELD_ADRESSE, FIELD_DESCRIPTION, FIELD_NOM,
    FIELD_OBSERVATIONS, FIELD_PRENOM, GENERAL_INFO, OBSERVATIONS,
};
use super::DraftDocument;
use fieldops_gateway::{DraftPatch, SearchStatus};

/// Build the `PATCH /searches/{id}` body.
///
/// Identity fields map one to one. `description` is the free-text body: the
/// description section first, then every other non-identity section as a
/// titled block, blank-line separated.
pub fn project(doc: &DraftDocument, status: SearchStatus) -> DraftPatch {
    let general = doc.section(GENERAL_INFO);
    let identity = |field: &str| {
        general
            .map(|s| s.value(field).trim().to_string())
            .unwrap_or_default()
    };

    let observations = doc
        .section(OBSERVATIONS)
        .map(|s| s.value(FIELD_OBSERVATIONS).trim().to_string())
        .unwrap_or_default();

    DraftPatch {
        nom: identity(FIELD_NOM),
        prenom: identity(FIELD_PRENOM),
        location: identity(FIELD_ADRESSE),
        description: assemble_body(doc.sections()),
        observations,
        status,
    }
}

fn assemble_body(sections: &[Section]) -> String {
    let mut blocks = Vec::new();

    if let Some(description) = sections.iter().find(|s| s.id == DESCRIPTION) {
        let text = description.value(FIELD_DESCRIPTION).trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
    }

    for section in sections {
        if matches!(section.id.as_str(), GENERAL_INFO | DESCRIPTION | OBSERVATIONS) {
            continue;
        }
        if let Some(block) = render_block(section) {
            blocks.push(block);
        }
    }

    blocks.join("\n\n")
}

fn render_block(section: &Section) -> Option<String> {
    let values: Vec<&str> = section
        .fields
        .iter()
        .map(|f| f.value.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }

    let title = section.title.trim();
    let body = values.join("\n");
    match section.kind {
        SectionKind::Custom if !title.is_empty() => Some(format!("{}\n{}", title, body)),
        _ => Some(body),
    }
}
