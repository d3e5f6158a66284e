//! Reference resolver
//!
//! Enforces existence constraints on writes and embeds referenced documents
//! on reads. Population expands a single hop: the embedded document is a
//! projection, so any reference it holds stays a raw id.

use std::collections::HashMap;
use std::sync::Arc;

use bson::{oid::ObjectId, Bson, Document};
use futures::future::join_all;
use tracing::debug;

use super::collaborator::Collaborator;
use crate::schema::{EntitySchema, FieldSpec, RefTarget, ReferenceSpec};
use crate::types::PlanError;

/// Outcome of one existence check
enum Check {
    Found,
    Missing { field: String, target: RefTarget, id: ObjectId },
}

/// Collaborators by reference target
#[derive(Default, Clone)]
pub struct ReferenceResolver {
    collaborators: HashMap<RefTarget, Arc<dyn Collaborator>>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the collaborator for its target, replacing any earlier one
    pub fn register(mut self, collaborator: Arc<dyn Collaborator>) -> Self {
        self.collaborators.insert(collaborator.target(), collaborator);
        self
    }

    pub fn collaborator(&self, target: RefTarget) -> Result<&Arc<dyn Collaborator>, PlanError> {
        self.collaborators
            .get(&target)
            .ok_or_else(|| PlanError::Config(format!("no store registered for {}", target)))
    }

    /// Check every non-null reference of `doc` that declares `exists`.
    ///
    /// With `only`, fields outside the list are skipped. Checks run
    /// concurrently. An unavailable collaborator outranks a missing
    /// reference so infrastructure failures are never reported as bad input.
    pub async fn check(
        &self,
        schema: &EntitySchema,
        doc: &Document,
        only: Option<&[String]>,
    ) -> Result<(), PlanError> {
        let mut checks = Vec::new();
        for (field, reference) in schema.references() {
            if !reference.exists || only.is_some_and(|only| !only.contains(&field.name)) {
                continue;
            }
            let Some(Bson::ObjectId(id)) = doc.get(&field.name) else {
                continue;
            };
            let collaborator = self.collaborator(reference.target)?;
            checks.push(async move {
                let found = collaborator.exists(*id).await?;
                Ok::<_, PlanError>(if found {
                    Check::Found
                } else {
                    Check::Missing {
                        field: field.name.clone(),
                        target: reference.target,
                        id: *id,
                    }
                })
            });
        }

        if checks.is_empty() {
            return Ok(());
        }

        let mut missing = None;
        for result in join_all(checks).await {
            match result? {
                Check::Found => {}
                Check::Missing { field, target, id } => {
                    missing.get_or_insert(PlanError::ReferenceNotFound {
                        field,
                        target: target.to_string(),
                        id: id.to_hex(),
                    });
                }
            }
        }

        match missing {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Replace reference ids of `doc` with their projected targets.
    ///
    /// A target that no longer exists is embedded as `null`.
    pub async fn populate(&self, schema: &EntitySchema, mut doc: Document) -> Result<Document, PlanError> {
        let mut lookups = Vec::new();
        for (field, reference) in schema.references() {
            let Some(populate) = &reference.populate else {
                continue;
            };
            if populate.max_depth == 0 {
                continue;
            }
            let Some(Bson::ObjectId(id)) = doc.get(&field.name) else {
                continue;
            };
            let id = *id;
            let collaborator = self.collaborator(reference.target)?;
            lookups.push(async move {
                let found = collaborator.fetch(id, &populate.select).await?;
                Ok::<_, PlanError>((field, reference, id, found))
            });
        }

        for result in join_all(lookups).await {
            let (field, reference, id, found) = result?;
            doc.insert(field.name.clone(), embed(field, reference, id, found));
        }

        Ok(doc)
    }
}

fn embed(field: &FieldSpec, reference: &ReferenceSpec, id: ObjectId, found: Option<Document>) -> Bson {
    match found {
        Some(target) => Bson::Document(target),
        None => {
            debug!(
                "{} {} referenced by '{}' no longer exists",
                reference.target, id, field.name
            );
            Bson::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryStore};
    use crate::references::StoreCollaborator;
    use crate::schema::{Populate, RefTarget};
    use async_trait::async_trait;
    use bson::doc;

    struct Unreachable(RefTarget);

    #[async_trait]
    impl Collaborator for Unreachable {
        fn target(&self) -> RefTarget {
            self.0
        }
        async fn exists(&self, _: ObjectId) -> Result<bool, PlanError> {
            Err(PlanError::CollaboratorUnavailable {
                target: self.0.to_string(),
                reason: "connection refused".into(),
            })
        }
        async fn fetch(&self, _: ObjectId, _: &[String]) -> Result<Option<Document>, PlanError> {
            Err(PlanError::CollaboratorUnavailable {
                target: self.0.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    fn schema() -> EntitySchema {
        EntitySchema::new("Plan", "plans", "plans")
            .field(
                FieldSpec::reference("boundary", RefTarget::Feature)
                    .exists()
                    .populate(Populate::select(["name", "country"])),
            )
            .field(
                FieldSpec::reference("owner", RefTarget::Party)
                    .exists()
                    .populate(Populate::select(["name"])),
            )
    }

    async fn fixture() -> (Arc<MemoryStore>, ReferenceResolver) {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn DocumentStore> = store.clone();
        let resolver = ReferenceResolver::new()
            .register(Arc::new(StoreCollaborator::new(RefTarget::Feature, "features", shared.clone())))
            .register(Arc::new(StoreCollaborator::new(RefTarget::Party, "parties", shared)));
        (store, resolver)
    }

    #[tokio::test]
    async fn test_check_passes_for_existing_and_absent_references() {
        let (store, resolver) = fixture().await;
        let party = store.insert("parties", doc! { "name": "Red Cross" }).await.unwrap();

        resolver
            .check(&schema(), &doc! { "owner": party }, None)
            .await
            .unwrap();
        resolver
            .check(&schema(), &doc! { "owner": Bson::Null }, None)
            .await
            .unwrap();
        resolver.check(&schema(), &doc! {}, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_reports_missing_reference() {
        let (_, resolver) = fixture().await;
        let ghost = ObjectId::new();

        let err = resolver
            .check(&schema(), &doc! { "boundary": ghost }, None)
            .await
            .unwrap_err();
        match err {
            PlanError::ReferenceNotFound { field, target, id } => {
                assert_eq!(field, "boundary");
                assert_eq!(target, "Feature");
                assert_eq!(id, ghost.to_hex());
            }
            other => panic!("expected reference not found, got {other:?}"),
        }

        // Skipped when the field is outside the checked set
        resolver
            .check(&schema(), &doc! { "boundary": ghost }, Some(&["owner".to_string()]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_outranks_missing() {
        let (_, resolver) = fixture().await;
        let resolver = resolver.register(Arc::new(Unreachable(RefTarget::Party)));

        let err = resolver
            .check(
                &schema(),
                &doc! { "boundary": ObjectId::new(), "owner": ObjectId::new() },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::CollaboratorUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_populate_embeds_projection_one_hop_deep() {
        let (store, resolver) = fixture().await;
        let parent = ObjectId::new();
        let boundary = store
            .insert(
                "features",
                doc! { "name": "Dar es Salaam", "country": "TZ", "parent": parent, "geometry": "..." },
            )
            .await
            .unwrap();
        let ghost = ObjectId::new();

        let populated = resolver
            .populate(&schema(), doc! { "boundary": boundary, "owner": ghost, "description": "x" })
            .await
            .unwrap();

        let embedded = populated.get_document("boundary").unwrap();
        assert_eq!(
            embedded,
            &doc! { "_id": boundary, "name": "Dar es Salaam", "country": "TZ" }
        );
        assert_eq!(populated.get("owner"), Some(&Bson::Null));
        assert_eq!(populated.get_str("description").unwrap(), "x");
    }

    #[tokio::test]
    async fn test_missing_collaborator_is_config_error() {
        let resolver = ReferenceResolver::new();
        let err = resolver
            .check(&schema(), &doc! { "owner": ObjectId::new() }, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
