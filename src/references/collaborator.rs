//! Collaborator stores
//!
//! A collaborator owns the documents behind one reference target. This
//! service only needs two things from it: whether an id exists, and a
//! projection of the document for population.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{oid::ObjectId, Document};

use crate::db::DocumentStore;
use crate::schema::RefTarget;
use crate::types::PlanError;

/// Source of truth for one reference target
#[async_trait]
pub trait Collaborator: Send + Sync {
    fn target(&self) -> RefTarget;

    /// Whether `id` resolves. Fails with `CollaboratorUnavailable` when the
    /// store cannot answer.
    async fn exists(&self, id: ObjectId) -> Result<bool, PlanError>;

    /// `_id` plus the selected fields of the document, if it exists
    async fn fetch(&self, id: ObjectId, select: &[String]) -> Result<Option<Document>, PlanError>;
}

/// Collaborator backed by a collection of the shared document store
pub struct StoreCollaborator {
    target: RefTarget,
    collection: String,
    store: Arc<dyn DocumentStore>,
}

impl StoreCollaborator {
    pub fn new(target: RefTarget, collection: &str, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            target,
            collection: collection.to_string(),
            store,
        }
    }

    fn unavailable(&self, err: PlanError) -> PlanError {
        match err {
            PlanError::Database(reason) => PlanError::CollaboratorUnavailable {
                target: self.target.to_string(),
                reason,
            },
            other => other,
        }
    }
}

#[async_trait]
impl Collaborator for StoreCollaborator {
    fn target(&self) -> RefTarget {
        self.target
    }

    async fn exists(&self, id: ObjectId) -> Result<bool, PlanError> {
        self.store
            .exists(&self.collection, id)
            .await
            .map_err(|e| self.unavailable(e))
    }

    async fn fetch(&self, id: ObjectId, select: &[String]) -> Result<Option<Document>, PlanError> {
        self.store
            .find_by_id(&self.collection, id, Some(select))
            .await
            .map_err(|e| self.unavailable(e))
    }
}
