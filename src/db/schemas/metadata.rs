//! Common metadata for all documents
//!
//! Tracks creation, update, and soft deletion timestamps.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was soft-deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Stamp a document that is about to be inserted
    pub fn touch_created(&mut self) {
        let now = DateTime::now();
        self.is_deleted = false;
        self.deleted_at = None;
        self.created_at = Some(now);
        self.updated_at = Some(now);
    }

    /// Stamp a document that is about to be replaced
    pub fn touch_updated(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_created_resets_deletion() {
        let mut metadata = Metadata {
            is_deleted: true,
            deleted_at: Some(DateTime::now()),
            ..Default::default()
        };
        metadata.touch_created();

        assert!(!metadata.is_deleted);
        assert!(metadata.deleted_at.is_none());
        assert_eq!(metadata.created_at, metadata.updated_at);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut metadata = Metadata::default();
        metadata.touch_created();
        let doc = bson::to_document(&metadata).unwrap();

        assert_eq!(doc.get_bool("isDeleted").unwrap(), false);
        assert!(doc.contains_key("createdAt"));
        assert!(!doc.contains_key("deletedAt"));
    }
}
