//! MongoDB client and collection wrapper
//!
//! `MongoStore` implements [`DocumentStore`] on top of a typed collection
//! wrapper that applies the soft-delete filter to every read.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use futures::stream::TryStreamExt;
use mongodb::{
    options::{
        FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
        ReturnDocument,
    },
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::db::store::{DocumentStore, IndexSpec, ListQuery, Page, TextSearch, DELETED_FLAG};
use crate::types::PlanError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<IndexSpec>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, PlanError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PlanError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PlanError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub fn collection<T>(&self, name: &str) -> MongoCollection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync,
    {
        MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        }
    }
}

/// Typed MongoDB collection that hides soft-deleted documents
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

/// Add the soft-delete exclusion to a filter
fn live(mut filter: Document) -> Document {
    filter.insert(DELETED_FLAG, doc! { "$ne": true });
    filter
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    /// Apply schema-defined indexes
    pub async fn apply_indexes(&self, indices: Vec<IndexSpec>) -> Result<(), PlanError> {
        if indices.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(models)
            .await
            .map_err(|e| PlanError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    pub async fn insert_one(&self, item: T) -> Result<ObjectId, PlanError> {
        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| PlanError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| PlanError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<T>, PlanError> {
        let options = FindOneOptions::builder().projection(projection).build();

        self.inner
            .find_one(live(filter))
            .with_options(options)
            .await
            .map_err(|e| PlanError::Database(format!("Find failed: {}", e)))
    }

    /// Find a sorted page of live documents
    pub async fn find_page(
        &self,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<T>, PlanError> {
        let options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| PlanError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect::<Vec<T>>()
            .await
            .map_err(|e| PlanError::Database(format!("Error reading documents: {}", e)))
    }

    /// Count live documents
    pub async fn count(&self, filter: Document) -> Result<u64, PlanError> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| PlanError::Database(format!("Count failed: {}", e)))
    }

    /// Replace a live document and return the new version
    pub async fn replace_one(&self, filter: Document, item: T) -> Result<Option<T>, PlanError> {
        let options = FindOneAndReplaceOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_replace(live(filter), item)
            .with_options(options)
            .await
            .map_err(|e| PlanError::Database(format!("Replace failed: {}", e)))
    }

    /// Soft delete a live document and return the flagged version
    pub async fn soft_delete(&self, filter: Document) -> Result<Option<T>, PlanError> {
        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "metadata.isDeleted": true,
                "metadata.deletedAt": now,
                "metadata.updatedAt": now,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_update(live(filter), update)
            .with_options(options)
            .await
            .map_err(|e| PlanError::Database(format!("Soft delete failed: {}", e)))
    }
}

/// Case-insensitive regex clauses, one per search field, for an `$or`
fn search_clauses(search: &TextSearch) -> Vec<Bson> {
    let pattern = regex::escape(search.text.trim());
    search
        .fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(field.clone(), doc! { "$regex": pattern.clone(), "$options": "i" });
            Bson::Document(clause)
        })
        .collect()
}

/// Translate a list query into a MongoDB filter document
pub fn list_filter(query: &ListQuery) -> Document {
    let mut filter = Document::new();
    for (field, value) in &query.filters {
        filter.insert(field.clone(), value.clone());
    }
    if let Some(search) = query.search.as_ref().filter(|s| !s.fields.is_empty()) {
        filter.insert("$or", search_clauses(search));
    }
    filter
}

/// [`DocumentStore`] backed by a MongoDB database
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
}

impl MongoStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.client.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ensure_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> Result<(), PlanError> {
        let count = indexes.len();
        self.collection(collection).apply_indexes(indexes).await?;
        debug!("Applied {} indexes to '{}'", count, collection);
        Ok(())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<ObjectId, PlanError> {
        self.collection(collection).insert_one(doc).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        projection: Option<&[String]>,
    ) -> Result<Option<Document>, PlanError> {
        let projection = projection.map(|fields| {
            let mut p = doc! { "_id": 1 };
            for field in fields {
                p.insert(field.clone(), 1);
            }
            p
        });

        self.collection(collection)
            .find_one(doc! { "_id": id }, projection)
            .await
    }

    async fn exists(&self, collection: &str, id: ObjectId) -> Result<bool, PlanError> {
        let found = self
            .collection(collection)
            .find_one(doc! { "_id": id }, Some(doc! { "_id": 1 }))
            .await?;
        Ok(found.is_some())
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> Result<Page, PlanError> {
        let collection = self.collection(collection);
        let filter = list_filter(query);
        let (field, direction) = &query.sort;
        let mut sort = Document::new();
        sort.insert(field.clone(), direction.as_i32());
        sort.insert("_id", direction.as_i32());

        let total = collection.count(filter.clone()).await?;
        let docs = collection
            .find_page(filter, sort, query.skip, query.limit as i64)
            .await?;

        Ok(Page { docs, total })
    }

    async fn replace(
        &self,
        collection: &str,
        id: ObjectId,
        mut doc: Document,
    ) -> Result<Option<Document>, PlanError> {
        doc.insert("_id", id);
        self.collection(collection)
            .replace_one(doc! { "_id": id }, doc)
            .await
    }

    async fn soft_delete(
        &self,
        collection: &str,
        id: ObjectId,
    ) -> Result<Option<Document>, PlanError> {
        self.collection(collection)
            .soft_delete(doc! { "_id": id })
            .await
    }
}
