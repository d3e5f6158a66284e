//! Declarative entity schemas
//!
//! Each entity describes its fields as an [`EntitySchema`]. The same manifest
//! drives request validation ([`EntitySchema::coerce`]), list filtering and
//! search, index creation, reference checks and read-time population, and is
//! served as JSON from `/<version>/<resource>/schema`.

mod field;
mod validate;

pub use field::{FieldKind, FieldSpec, Populate, RefTarget, ReferenceSpec, MAX_POPULATE_DEPTH};
pub use validate::Mode;

use serde::Serialize;

/// Field manifest of one entity type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub model_name: String,
    pub collection_name: String,
    /// Path segment the entity is served under (e.g., "plans")
    pub resource: String,
    pub fields: Vec<FieldSpec>,
}

impl EntitySchema {
    pub fn new(model_name: &str, collection_name: &str, resource: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            collection_name: collection_name.to_string(),
            resource: resource.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reference fields with their declarations
    pub fn references(&self) -> impl Iterator<Item = (&FieldSpec, &ReferenceSpec)> {
        self.fields
            .iter()
            .filter_map(|f| f.as_reference().map(|r| (f, r)))
    }

    pub fn searchable_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn filterable_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_filterable())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Whether a list may be sorted by this path
    pub fn is_sortable(&self, path: &str) -> bool {
        path == "_id" || path.starts_with("metadata.") || self.get(path).is_some()
    }
}
