//! Database layer
//!
//! MongoDB and in-memory backends behind the [`DocumentStore`] trait, plus the
//! typed documents of each entity.

pub mod entity;
pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use entity::Entity;
pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MongoStore, MutMetadata};
pub use store::{DocumentStore, ListQuery, Page, SortDirection, TextSearch};
