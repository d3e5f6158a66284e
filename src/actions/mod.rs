//! Generic CRUD actions
//!
//! [`Resource<T>`] implements list, get, create, update and delete for any
//! [`Entity`]. Writes run in a fixed order and nothing is persisted unless
//! every step passes:
//!
//! 1. coerce the body against the field manifest
//! 2. decode into the typed document
//! 3. the entity's own hook, then registered hooks
//! 4. reference existence checks
//! 5. metadata stamping and persistence
//!
//! Reads populate references one hop deep before shaping the JSON response.

pub mod json;
pub mod params;

pub use params::{list_params, parse_query, ListParams};

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info};

use crate::db::Entity;
use crate::hooks::PreValidate;
use crate::schema::{EntitySchema, Mode};
use crate::services::Services;
use crate::types::PlanError;

/// Object-safe view of a resource, used by routers
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn schema(&self) -> &EntitySchema;

    fn resource(&self) -> &str {
        &self.schema().resource
    }

    async fn ensure_indexes(&self) -> Result<(), PlanError>;

    async fn exists(&self, id: &str) -> Result<bool, PlanError>;

    async fn list(&self, params: ListParams) -> Result<Value, PlanError>;

    async fn get(&self, id: &str) -> Result<Value, PlanError>;

    async fn create(&self, body: &Value) -> Result<Value, PlanError>;

    /// Merge `body` into the stored document
    async fn update(&self, id: &str, body: &Value) -> Result<Value, PlanError>;

    /// Soft delete, returning the deleted document
    async fn delete(&self, id: &str) -> Result<Value, PlanError>;
}

/// CRUD actions for documents of type `T`
pub struct Resource<T: Entity> {
    schema: EntitySchema,
    services: Arc<Services>,
    hooks: Vec<Arc<dyn PreValidate<T>>>,
    _entity: PhantomData<fn() -> T>,
}

pub fn parse_id(raw: &str) -> Result<ObjectId, PlanError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| PlanError::BadRequest(format!("'{}' is not a valid id", raw)))
}

impl<T: Entity> Resource<T> {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            schema: T::schema(&services.models),
            services,
            hooks: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Register a hook to run after the entity's own hook
    pub fn with_hook(mut self, hook: Arc<dyn PreValidate<T>>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_hooks(self, hooks: Vec<Arc<dyn PreValidate<T>>>) -> Self {
        hooks.into_iter().fold(self, Self::with_hook)
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    fn collection(&self) -> &str {
        &self.schema.collection_name
    }

    /// Turn a candidate document into a valid entity, or fail without side effects.
    ///
    /// With `existing`, only references that differ from the stored version
    /// are checked.
    async fn prepare(&self, candidate: Document, existing: Option<&Document>) -> Result<T, PlanError> {
        let mut entity: T = bson::from_document(candidate)
            .map_err(|e| PlanError::BadRequest(format!("document does not match {}: {}", self.schema.model_name, e)))?;

        let previous: Option<T> = existing
            .map(|doc| bson::from_document(doc.clone()))
            .transpose()?;

        entity.pre_validate()?;
        for hook in &self.hooks {
            debug!("Running {} hook '{}'", self.schema.model_name, hook.name());
            hook.run(&mut entity, previous.as_ref(), &self.services).await?;
        }

        let checked = bson::to_document(&entity)?;
        let changed: Option<Vec<String>> = existing.map(|existing| {
            self.schema
                .references()
                .filter(|(field, _)| checked.get(&field.name) != existing.get(&field.name))
                .map(|(field, _)| field.name.clone())
                .collect()
        });
        self.services
            .resolver
            .check(&self.schema, &checked, changed.as_deref())
            .await?;

        Ok(entity)
    }

    async fn present(&self, doc: Document) -> Result<Value, PlanError> {
        let populated = self.services.resolver.populate(&self.schema, doc).await?;
        Ok(json::document_to_json(&populated))
    }

    async fn stored(&self, id: ObjectId) -> Result<Document, PlanError> {
        self.services
            .store
            .find_by_id(self.collection(), id, None)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("{} {}", self.schema.model_name, id)))
    }
}

#[async_trait]
impl<T: Entity> ResourceHandler for Resource<T> {
    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    async fn ensure_indexes(&self) -> Result<(), PlanError> {
        self.services
            .store
            .ensure_indexes(self.collection(), T::into_indices())
            .await
    }

    async fn exists(&self, id: &str) -> Result<bool, PlanError> {
        self.services.store.exists(self.collection(), parse_id(id)?).await
    }

    async fn list(&self, params: ListParams) -> Result<Value, PlanError> {
        let page = self.services.store.list(self.collection(), &params.query).await?;
        let docs = try_join_all(
            page.docs
                .into_iter()
                .map(|doc| self.services.resolver.populate(&self.schema, doc)),
        )
        .await?;
        Ok(json::list_body(&docs, page.total, params.window()))
    }

    async fn get(&self, id: &str) -> Result<Value, PlanError> {
        let doc = self.stored(parse_id(id)?).await?;
        self.present(doc).await
    }

    async fn create(&self, body: &Value) -> Result<Value, PlanError> {
        let candidate = self.schema.coerce(body, Mode::Create)?;
        let mut entity = self.prepare(candidate, None).await?;

        entity.mut_metadata().touch_created();
        let id = self
            .services
            .store
            .insert(self.collection(), bson::to_document(&entity)?)
            .await?;
        info!("Created {} {}", self.schema.model_name, id);

        let doc = self.stored(id).await?;
        self.present(doc).await
    }

    async fn update(&self, id: &str, body: &Value) -> Result<Value, PlanError> {
        let id = parse_id(id)?;
        let existing = self.stored(id).await?;
        let changes = self.schema.coerce(body, Mode::Update)?;

        let mut candidate = existing.clone();
        for (field, value) in changes {
            match value {
                Bson::Null => {
                    candidate.remove(&field);
                }
                value => {
                    candidate.insert(field, value);
                }
            }
        }

        let mut entity = self.prepare(candidate, Some(&existing)).await?;
        entity.mut_metadata().touch_updated();
        let doc = self
            .services
            .store
            .replace(self.collection(), id, bson::to_document(&entity)?)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("{} {}", self.schema.model_name, id)))?;
        info!("Updated {} {}", self.schema.model_name, id);

        self.present(doc).await
    }

    async fn delete(&self, id: &str) -> Result<Value, PlanError> {
        let id = parse_id(id)?;
        let doc = self
            .services
            .store
            .soft_delete(self.collection(), id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("{} {}", self.schema.model_name, id)))?;
        info!("Deleted {} {}", self.schema.model_name, id);

        self.present(doc).await
    }
}
