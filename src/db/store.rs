//! Storage contract shared by the MongoDB and in-memory backends
//!
//! Every read excludes soft-deleted documents (`metadata.isDeleted: true`).

use std::cmp::Ordering;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use mongodb::options::IndexOptions;

use crate::types::PlanError;

/// Index definition: key document plus options
pub type IndexSpec = (Document, Option<IndexOptions>);

/// Path of the soft-delete flag inside a stored document
pub const DELETED_FLAG: &str = "metadata.isDeleted";

/// Default list ordering: most recently updated first
pub const DEFAULT_SORT_FIELD: &str = "metadata.updatedAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// Case-insensitive substring search over a set of fields
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearch {
    pub fields: Vec<String>,
    pub text: String,
}

/// A filtered, sorted page request
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Equality filters; `Bson::Null` matches unset fields
    pub filters: Vec<(String, Bson)>,
    pub search: Option<TextSearch>,
    pub sort: (String, SortDirection),
    pub skip: u64,
    pub limit: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            search: None,
            sort: (DEFAULT_SORT_FIELD.to_string(), SortDirection::Desc),
            skip: 0,
            limit: 10,
        }
    }
}

/// One page of matching documents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub docs: Vec<Document>,
    /// Number of documents matching the query, ignoring skip/limit
    pub total: u64,
}

/// Document persistence used by the generic CRUD actions and collaborators
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create schema-declared indexes for a collection
    async fn ensure_indexes(&self, collection: &str, indexes: Vec<IndexSpec>)
        -> Result<(), PlanError>;

    async fn insert(&self, collection: &str, doc: Document) -> Result<ObjectId, PlanError>;

    /// Fetch a live document, optionally keeping only `_id` and the listed fields
    async fn find_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        projection: Option<&[String]>,
    ) -> Result<Option<Document>, PlanError>;

    async fn exists(&self, collection: &str, id: ObjectId) -> Result<bool, PlanError>;

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Page, PlanError>;

    /// Replace a live document, returning the stored result
    async fn replace(
        &self,
        collection: &str,
        id: ObjectId,
        doc: Document,
    ) -> Result<Option<Document>, PlanError>;

    /// Flag a live document as deleted, returning the flagged document
    async fn soft_delete(&self, collection: &str, id: ObjectId)
        -> Result<Option<Document>, PlanError>;
}

/// Resolve a dotted path (e.g., "metadata.updatedAt") inside a document
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn is_deleted(doc: &Document) -> bool {
    matches!(get_path(doc, DELETED_FLAG), Some(Bson::Boolean(true)))
}

/// Total order over the value types this service stores.
///
/// Missing and null sort first; values of unrelated types compare equal.
pub fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let a = a.filter(|v| !matches!(v, Bson::Null));
    let b = b.filter(|v| !matches!(v, Bson::Null));

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Bson::String(x), Bson::String(y)) => x.cmp(y),
            (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
            (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
            (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
            (x, y) => match (as_f64(x), as_f64(y)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Equality filter semantics shared with MongoDB: null matches missing
pub fn matches_filter(doc: &Document, field: &str, expected: &Bson) -> bool {
    match (get_path(doc, field), expected) {
        (None, Bson::Null) | (Some(Bson::Null), Bson::Null) => true,
        (Some(actual), expected) => {
            actual == expected
                || (as_f64(actual).is_some()
                    && as_f64(expected).is_some()
                    && compare_bson(Some(actual), Some(expected)) == Ordering::Equal)
        }
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_get_path() {
        let d = doc! { "metadata": { "isDeleted": true }, "name": "Flood" };
        assert_eq!(get_path(&d, "name"), Some(&Bson::String("Flood".into())));
        assert_eq!(get_path(&d, "metadata.isDeleted"), Some(&Bson::Boolean(true)));
        assert_eq!(get_path(&d, "metadata.missing"), None);
        assert_eq!(get_path(&d, "name.inner"), None);
        assert!(is_deleted(&d));
        assert!(!is_deleted(&doc! { "name": "Flood" }));
    }

    #[test]
    fn test_compare_bson() {
        let one = Bson::Int64(1);
        let two = Bson::Int32(2);
        assert_eq!(compare_bson(Some(&one), Some(&two)), Ordering::Less);
        assert_eq!(compare_bson(None, Some(&one)), Ordering::Less);
        assert_eq!(compare_bson(Some(&Bson::Null), None), Ordering::Equal);
        assert_eq!(
            compare_bson(Some(&Bson::String("b".into())), Some(&Bson::String("a".into()))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_matches_filter() {
        let d = doc! { "number": 2_i64, "owner": Bson::Null };
        assert!(matches_filter(&d, "number", &Bson::Int32(2)));
        assert!(!matches_filter(&d, "number", &Bson::Int64(3)));
        assert!(matches_filter(&d, "owner", &Bson::Null));
        assert!(matches_filter(&d, "boundary", &Bson::Null));
        assert!(!matches_filter(&d, "boundary", &Bson::String("x".into())));
    }
}
