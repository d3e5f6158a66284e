//! In-memory document store
//!
//! Used in dev mode when MongoDB is unreachable, and by tests. Mirrors the
//! MongoDB backend's semantics: soft-deleted documents are invisible, null
//! filters match unset fields, searches are case-insensitive substrings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, DateTime, Document};
use dashmap::DashMap;
use regex::RegexBuilder;
use tracing::debug;

use crate::db::store::{
    compare_bson, get_path, is_deleted, matches_filter, DocumentStore, IndexSpec, ListQuery, Page,
    SortDirection,
};
use crate::types::PlanError;

/// Collections of documents keyed by id; ids sort in insertion order
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<ObjectId, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, including soft-deleted ones
    pub fn raw_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    fn live_doc(&self, collection: &str, id: &ObjectId) -> Option<Document> {
        self.collections
            .get(collection)?
            .get(id)
            .filter(|doc| !is_deleted(doc))
            .cloned()
    }
}

fn project(doc: Document, fields: &[String]) -> Document {
    let mut projected = Document::new();
    if let Some(id) = doc.get("_id") {
        projected.insert("_id", id.clone());
    }
    for field in fields {
        if let Some(value) = doc.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    projected
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> Result<(), PlanError> {
        debug!(
            "Memory store ignores {} indexes for '{}'",
            indexes.len(),
            collection
        );
        Ok(())
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<ObjectId, PlanError> {
        let id = match doc.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(PlanError::Database(format!(
                    "unsupported _id type: {:?}",
                    other.element_type()
                )))
            }
            None => ObjectId::new(),
        };
        doc.insert("_id", id);

        let mut entries = self.collections.entry(collection.to_string()).or_default();
        if entries.contains_key(&id) {
            return Err(PlanError::Database(format!(
                "duplicate key {} in '{}'",
                id, collection
            )));
        }
        entries.insert(id, doc);
        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        projection: Option<&[String]>,
    ) -> Result<Option<Document>, PlanError> {
        let doc = self.live_doc(collection, &id);
        Ok(match projection {
            Some(fields) => doc.map(|d| project(d, fields)),
            None => doc,
        })
    }

    async fn exists(&self, collection: &str, id: ObjectId) -> Result<bool, PlanError> {
        Ok(self.live_doc(collection, &id).is_some())
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Page, PlanError> {
        let search = match query.search.as_ref().filter(|s| !s.fields.is_empty()) {
            Some(search) => {
                let regex = RegexBuilder::new(&regex::escape(search.text.trim()))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| PlanError::Internal(format!("search pattern: {}", e)))?;
                Some((search.fields.clone(), regex))
            }
            None => None,
        };

        let mut matched: Vec<Document> = match self.collections.get(collection) {
            Some(entries) => entries
                .values()
                .filter(|doc| !is_deleted(doc))
                .filter(|doc| {
                    query
                        .filters
                        .iter()
                        .all(|(field, value)| matches_filter(doc, field, value))
                })
                .filter(|doc| match &search {
                    Some((fields, regex)) => fields.iter().any(|field| {
                        matches!(get_path(doc, field), Some(Bson::String(s)) if regex.is_match(s))
                    }),
                    None => true,
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let (field, direction) = &query.sort;
        matched.sort_by(|a, b| {
            let ordering = compare_bson(get_path(a, field), get_path(b, field))
                .then_with(|| compare_bson(a.get("_id"), b.get("_id")));
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as u64;
        let docs = matched
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect();

        Ok(Page { docs, total })
    }

    async fn replace(
        &self,
        collection: &str,
        id: ObjectId,
        mut doc: Document,
    ) -> Result<Option<Document>, PlanError> {
        let Some(mut entries) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        match entries.get_mut(&id) {
            Some(existing) if !is_deleted(existing) => {
                doc.insert("_id", id);
                *existing = doc.clone();
                Ok(Some(doc))
            }
            _ => Ok(None),
        }
    }

    async fn soft_delete(
        &self,
        collection: &str,
        id: ObjectId,
    ) -> Result<Option<Document>, PlanError> {
        let Some(mut entries) = self.collections.get_mut(collection) else {
            return Ok(None);
        };
        match entries.get_mut(&id) {
            Some(existing) if !is_deleted(existing) => {
                let now = DateTime::now();
                let mut metadata = existing.get_document("metadata").cloned().unwrap_or_default();
                metadata.insert("isDeleted", true);
                metadata.insert("deletedAt", now);
                metadata.insert("updatedAt", now);
                existing.insert("metadata", metadata);
                Ok(Some(existing.clone()))
            }
            _ => Ok(None),
        }
    }
}
