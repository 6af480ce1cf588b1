//! Eligibility gate for remote draft creation
//!
//! Keeps abandoned, near-empty reports from ever reaching the server: a draft
//! is only created once every required identity field is filled in.

use crate::document::{DraftDocument, GENERAL_INFO};

/// Whether a remote draft may be created for this document
pub fn is_eligible(doc: &DraftDocument, force_creation: bool) -> bool {
    force_creation || missing_required_fields(doc).is_empty()
}

/// Required `general_info` fields that are still blank
pub fn missing_required_fields(doc: &DraftDocument) -> Vec<String> {
    match doc.section(GENERAL_INFO) {
        Some(section) => section
            .fields
            .iter()
            .filter(|f| f.required && !f.is_filled())
            .map(|f| f.id.clone())
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FIELD_ADRESSE, FIELD_NOM, FIELD_PRENOM};

    #[test]
    fn test_empty_document_is_not_eligible() {
        let doc = DraftDocument::new();
        assert!(!is_eligible(&doc, false));
        assert_eq!(missing_required_fields(&doc), vec!["nom", "prenom", "adresse"]);
    }

    #[test]
    fn test_forced_creation_is_always_eligible() {
        let doc = DraftDocument::new();
        assert!(is_eligible(&doc, true));
    }

    #[test]
    fn test_whitespace_only_value_does_not_count() {
        let mut doc = DraftDocument::new();
        doc.update_field(GENERAL_INFO, FIELD_NOM, "Jean").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_PRENOM, "   ").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_ADRESSE, "1 Rue X").unwrap();

        assert!(!is_eligible(&doc, false));
        assert_eq!(missing_required_fields(&doc), vec!["prenom"]);
    }

    #[test]
    fn test_all_identity_fields_filled() {
        let mut doc = DraftDocument::new();
        doc.update_field(GENERAL_INFO, FIELD_NOM, "Jean").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_PRENOM, "Dupont").unwrap();
        doc.update_field(GENERAL_INFO, FIELD_ADRESSE, "1 Rue X").unwrap();

        assert!(is_eligible(&doc, false));
    }
}
