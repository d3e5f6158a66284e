//! Activity document schema
//!
//! Activities break a plan down into ordered, phase-tagged steps.

use std::fmt;

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::db::entity::Entity;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::plan::{INCIDENT_TYPE_SELECT, PLAN_SELECT};
use crate::db::schemas::Metadata;
use crate::schema::{EntitySchema, FieldSpec, Populate, RefTarget};

/// Resource path segment for activities
pub const ACTIVITY_RESOURCE: &str = "activities";

/// Activity fields embedded where a procedure references its activity
pub const ACTIVITY_SELECT: [&str; 4] = ["plan", "phase", "number", "name"];

/// Longest accepted activity or procedure name
pub const MAX_NAME_LENGTH: usize = 200;

/// Disaster management phase an activity belongs to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    Mitigation,
    Preparedness,
    #[default]
    Response,
    Recovery,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Mitigation,
        Phase::Preparedness,
        Phase::Response,
        Phase::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mitigation => "Mitigation",
            Self::Preparedness => "Preparedness",
            Self::Response => "Response",
            Self::Recovery => "Recovery",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Plan this activity belongs to
    pub plan: ObjectId,

    /// Incident type, inherited from the plan when not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_type: Option<ObjectId>,

    #[serde(default)]
    pub phase: Phase,

    /// Position of the activity within its plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field manifest for activities
pub fn activity_schema(config: &ModelConfig) -> EntitySchema {
    EntitySchema::new(
        &config.activity_model_name,
        &config.activity_collection_name,
        ACTIVITY_RESOURCE,
    )
    .field(
        FieldSpec::reference("plan", RefTarget::Plan)
            .required()
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(PLAN_SELECT)),
    )
    .field(
        FieldSpec::reference("incidentType", RefTarget::IncidentType)
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(INCIDENT_TYPE_SELECT)),
    )
    .field(
        FieldSpec::enumeration("phase", Phase::ALL.iter().map(Phase::as_str))
            .index()
            .taggable()
            .default_value(Phase::default().as_str()),
    )
    .field(FieldSpec::integer("number").index().min(1))
    .field(
        FieldSpec::string("name")
            .required()
            .index()
            .searchable()
            .max_length(MAX_NAME_LENGTH)
            .fake("lorem.sentence"),
    )
    .field(
        FieldSpec::string("description")
            .searchable()
            .fake("lorem.paragraph"),
    )
}

impl Entity for ActivityDoc {
    fn schema(config: &ModelConfig) -> EntitySchema {
        activity_schema(config)
    }
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Activities of a plan in order
            (
                doc! { "plan": 1, "number": 1 },
                Some(
                    IndexOptions::builder()
                        .name("plan_number_index".to_string())
                        .build(),
                ),
            ),
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
                doc! { "phase": 1 },
                Some(
                    IndexOptions::builder()
                        .name("phase_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "number": 1 },
                Some(
                    IndexOptions::builder()
                        .name("number_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            (
                doc! { "name": 1 },
                Some(
                    IndexOptions::builder()
                        .name("name_index".to_string())
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

impl MutMetadata for ActivityDoc {
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
        let schema = activity_schema(&ModelConfig::default());
        let indexed = indexed_fields(&ActivityDoc::into_indices());
        for field in schema.fields.iter().filter(|f| f.index) {
            assert!(indexed.contains(&field.name), "{} has no index", field.name);
        }
    }

    #[test]
    fn test_phase_defaults_to_response() {
        let doc = doc! { "plan": ObjectId::new(), "name": "Evacuate" };
        let activity: ActivityDoc = bson::from_document(doc).unwrap();
        assert_eq!(activity.phase, Phase::Response);
        assert!(activity.incident_type.is_none());
    }

    #[test]
    fn test_schema_phase_values_match_enum() {
        let schema = activity_schema(&ModelConfig::default());
        let json = serde_json::to_value(schema.get("phase").unwrap()).unwrap();
        assert_eq!(
            json["kind"]["values"],
            serde_json::json!(["Mitigation", "Preparedness", "Response", "Recovery"])
        );
        assert_eq!(json["default"], "Response");
    }
}
