//! Procedure document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::db::entity::Entity;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::activity::{ACTIVITY_SELECT, MAX_NAME_LENGTH};
use crate::db::schemas::plan::PLAN_SELECT;
use crate::db::schemas::Metadata;
use crate::schema::{EntitySchema, FieldSpec, Populate, RefTarget};

/// Resource path segment for procedures
pub const PROCEDURE_RESOURCE: &str = "procedures";

/// Procedure document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Plan of the parent activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ObjectId>,

    /// Activity this procedure refines
    pub activity: ObjectId,

    /// Position of the procedure within its activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field manifest for procedures
pub fn procedure_schema(config: &ModelConfig) -> EntitySchema {
    EntitySchema::new(
        &config.procedure_model_name,
        &config.procedure_collection_name,
        PROCEDURE_RESOURCE,
    )
    .field(
        FieldSpec::reference("plan", RefTarget::Plan)
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(PLAN_SELECT)),
    )
    .field(
        FieldSpec::reference("activity", RefTarget::Activity)
            .required()
            .index()
            .taggable()
            .exists()
            .populate(Populate::select(ACTIVITY_SELECT)),
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

impl Entity for ProcedureDoc {
    fn schema(config: &ModelConfig) -> EntitySchema {
        procedure_schema(config)
    }
}

impl IntoIndexes for ProcedureDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "plan": 1 },
                Some(
                    IndexOptions::builder()
                        .name("plan_index".to_string())
                        .build(),
                ),
            ),
            // Procedures of an activity in order
            (
                doc! { "activity": 1, "number": 1 },
                Some(
                    IndexOptions::builder()
                        .name("activity_number_index".to_string())
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

impl MutMetadata for ProcedureDoc {
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
        let schema = procedure_schema(&ModelConfig::default());
        let indexed = indexed_fields(&ProcedureDoc::into_indices());
        for field in schema.fields.iter().filter(|f| f.index) {
            assert!(indexed.contains(&field.name), "{} has no index", field.name);
        }
    }

    #[test]
    fn test_schema_uses_configured_names() {
        let config = ModelConfig {
            procedure_model_name: "Step".into(),
            procedure_collection_name: "steps".into(),
            ..Default::default()
        };
        let schema = procedure_schema(&config);
        assert_eq!(schema.model_name, "Step");
        assert_eq!(schema.collection_name, "steps");
        assert_eq!(schema.resource, PROCEDURE_RESOURCE);
    }
}
