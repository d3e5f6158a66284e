//! Reference resolution
//!
//! Plans, activities and procedures point at each other and at entities
//! owned by collaborator services. Each reference target is served by one
//! [`Collaborator`]:
//!
//! - Plan and Activity always resolve from this service's own collections.
//! - IncidentType, Feature and Party resolve from an HTTP service when its
//!   URL is configured, otherwise from a collection of the shared database.

mod collaborator;
mod http;
mod resolver;

pub use collaborator::{Collaborator, StoreCollaborator};
pub use http::HttpCollaborator;
pub use resolver::ReferenceResolver;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{Args, ModelConfig};
use crate::db::DocumentStore;
use crate::schema::RefTarget;
use crate::types::PlanError;

/// Resolver reading every target from the shared document store
pub fn store_resolver(config: &ModelConfig, store: Arc<dyn DocumentStore>) -> ReferenceResolver {
    let collections = [
        (RefTarget::Plan, &config.plan_collection_name),
        (RefTarget::Activity, &config.activity_collection_name),
        (RefTarget::IncidentType, &config.incident_type_collection_name),
        (RefTarget::Feature, &config.feature_collection_name),
        (RefTarget::Party, &config.party_collection_name),
    ];

    collections
        .into_iter()
        .fold(ReferenceResolver::new(), |resolver, (target, collection)| {
            resolver.register(Arc::new(StoreCollaborator::new(
                target,
                collection,
                Arc::clone(&store),
            )))
        })
}

/// Resolver for the running service: store-backed, with HTTP collaborators
/// for every target that has a service URL configured
pub fn build_resolver(args: &Args, store: Arc<dyn DocumentStore>) -> Result<ReferenceResolver, PlanError> {
    let timeout = Duration::from_millis(args.request_timeout_ms);
    let services = [
        (RefTarget::Party, &args.collaborators.party_service_url),
        (RefTarget::Feature, &args.collaborators.feature_service_url),
        (RefTarget::IncidentType, &args.collaborators.incident_type_service_url),
    ];

    let mut resolver = store_resolver(&args.model_config(), store);
    for (target, url) in services {
        if let Some(url) = url.as_deref().filter(|u| !u.trim().is_empty()) {
            info!("{} references resolve via {}", target, url);
            resolver = resolver.register(Arc::new(HttpCollaborator::new(target, url, timeout)?));
        }
    }

    Ok(resolver)
}
