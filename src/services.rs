//! Shared request services
//!
//! Everything a resource action needs besides the request itself. Built once
//! at startup and shared by every router.

use std::sync::Arc;

use crate::config::{Args, ModelConfig, PageLimits};
use crate::db::{DocumentStore, MemoryStore};
use crate::references::{self, ReferenceResolver};
use crate::types::PlanError;

pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub resolver: ReferenceResolver,
    pub models: ModelConfig,
    pub limits: PageLimits,
}

impl Services {
    /// Services for the running process
    pub fn from_args(args: &Args, store: Arc<dyn DocumentStore>) -> Result<Self, PlanError> {
        let resolver = references::build_resolver(args, Arc::clone(&store))?;
        Ok(Self {
            store,
            resolver,
            models: args.model_config(),
            limits: args.page_limits(),
        })
    }

    /// Services over a fresh in-memory store, every reference resolving from it
    pub fn in_memory(models: ModelConfig) -> (Self, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn DocumentStore> = memory.clone();
        let services = Self {
            resolver: references::store_resolver(&models, Arc::clone(&store)),
            store,
            models,
            limits: PageLimits::default(),
        };
        (services, memory)
    }
}
