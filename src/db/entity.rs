//! Typed entity contract
//!
//! Ties a stored document type to its field manifest, its indexes and its
//! own pre-validation hook.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::config::ModelConfig;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::schema::EntitySchema;
use crate::types::PlanError;

/// A document type served as a REST resource
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + Unpin + IntoIndexes + MutMetadata + 'static
{
    /// Field manifest, with model and collection names taken from `config`
    fn schema(config: &ModelConfig) -> EntitySchema;

    /// Runs after the body has been coerced into the document type and
    /// before references are checked. Return an error to reject the write.
    fn pre_validate(&mut self) -> Result<(), PlanError> {
        Ok(())
    }
}
