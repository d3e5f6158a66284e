//! Plan document schema
//!
//! A plan describes how to respond to a class of incidents within a
//! boundary. Absent references widen its scope: no incident type means every
//! incident type, no boundary means every boundary.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::db::entity::Entity;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::schema::{EntitySchema, FieldSpec, Populate, RefTarget};

/// Resource path segment for plans
pub const PLAN_RESOURCE: &str = "plans";

/// Plan fields embedded where another document references a plan
pub const PLAN_SELECT: [&str; 5] = ["incidentType", "boundary", "owner", "description", "publishedAt"];

/// Incident type fields embedded on reads
pub const INCIDENT_TYPE_SELECT: [&str; 5] = ["nature", "family", "code", "name", "color"];

/// Party fields embedded on reads
pub const PARTY_SELECT: [&str; 5] = ["type", "name", "title", "email", "mobile"];

/// Feature fields embedded on reads, before administrative levels
pub const FEATURE_SELECT: [&str; 4] = ["category", "type", "level", "name"];

/// Plan document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Incident type the plan applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_type: Option<ObjectId>,

    /// Boundary feature the plan applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<ObjectId>,

    /// Party maintaining the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Effective date; unset while the plan is a draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime>,
}

/// Feature projection: base fields plus each administrative level
pub fn feature_select(config: &ModelConfig) -> Populate {
    Populate::select(
        FEATURE_SELECT
            .iter()
            .map(|s| s.to_string())
            .chain(config.boundary_levels.iter().cloned()),
    )
}

/// Field manifest for plans
pub fn plan_schema(config: &ModelConfig) -> EntitySchema {
    EntitySchema::new(
        &config.plan_model_name,
        &config.plan_collection_name,
        PLAN_RESOURCE,
    )
    .field(
        FieldSpec::reference("incidentType", RefTarget::IncidentType)
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(INCIDENT_TYPE_SELECT)),
    )
    .field(
        FieldSpec::reference("boundary", RefTarget::Feature)
            .index()
            .taggable()
            .exists()
            .populate(feature_select(config)),
    )
    .field(
        FieldSpec::reference("owner", RefTarget::Party)
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(PARTY_SELECT)),
    )
    .field(
        FieldSpec::string("description")
            .index()
            .searchable()
            .fake("lorem.paragraph"),
    )
    .field(FieldSpec::date("publishedAt").index().fake("date.past"))
}

impl Entity for PlanDoc {
    fn schema(config: &ModelConfig) -> EntitySchema {
        plan_schema(config)
    }
}

impl IntoIndexes for PlanDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "incidentType": 1 },
                Some(
                    IndexOptions::builder()
                        .name("incident_type_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            (
                doc! { "boundary": 1 },
                Some(
                    IndexOptions::builder()
                        .name("boundary_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            (
                doc! { "owner": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            (
                doc! { "description": 1 },
                Some(
                    IndexOptions::builder()
                        .name("description_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "publishedAt": 1 },
                Some(
                    IndexOptions::builder()
                        .name("published_at_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "metadata.isDeleted": 1, "metadata.updatedAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("live_updated_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PlanDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::indexed_fields;

    #[test]
    fn test_every_indexed_field_has_an_index() {
        let schema = plan_schema(&ModelConfig::default());
        let indexed = indexed_fields(&PlanDoc::into_indices());
        for field in schema.fields.iter().filter(|f| f.index) {
            assert!(indexed.contains(&field.name), "{} has no index", field.name);
        }
    }

    #[test]
    fn test_boundary_select_includes_levels() {
        let config = ModelConfig {
            boundary_levels: vec!["country".into(), "ward".into()],
            ..Default::default()
        };
        let schema = plan_schema(&config);
        let boundary = schema.get("boundary").and_then(|f| f.as_reference()).unwrap();
        assert_eq!(
            boundary.populate.as_ref().unwrap().select,
            vec!["category", "type", "level", "name", "country", "ward"]
        );
    }

    #[test]
    fn test_unset_fields_are_not_stored() {
        let plan = PlanDoc {
            description: Some("Flood response".into()),
            ..Default::default()
        };
        let doc = bson::to_document(&plan).unwrap();
        assert!(!doc.contains_key("publishedAt"));
        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.get_str("description").unwrap(), "Flood response");
    }

    #[test]
    fn test_stored_id_round_trips() {
        let id = ObjectId::new();
        let stored = doc! { "_id": id, "description": "Flood response" };

        let plan: PlanDoc = bson::from_document(stored).unwrap();
        assert_eq!(plan._id, Some(id));

        let doc = bson::to_document(&plan).unwrap();
        assert_eq!(doc.get_object_id("_id").unwrap(), id);
        assert!(!doc.contains_key("id"));
    }
}
