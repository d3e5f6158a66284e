//! Database schemas for emis-plan
//!
//! Defines MongoDB document structures for plans, activities and procedures.

mod activity;
mod metadata;
mod plan;
mod procedure;

pub use activity::{activity_schema, ActivityDoc, Phase, ACTIVITY_RESOURCE, ACTIVITY_SELECT, MAX_NAME_LENGTH};
pub use metadata::Metadata;
pub use plan::{
    feature_select, plan_schema, PlanDoc, FEATURE_SELECT, INCIDENT_TYPE_SELECT, PARTY_SELECT,
    PLAN_RESOURCE, PLAN_SELECT,
};
pub use procedure::{procedure_schema, ProcedureDoc, PROCEDURE_RESOURCE};

/// Top-level field names covered by a set of index definitions
#[cfg(test)]
pub(crate) fn indexed_fields(indices: &[crate::db::store::IndexSpec]) -> Vec<String> {
    indices
        .iter()
        .flat_map(|(keys, _)| keys.keys().cloned().collect::<Vec<_>>())
        .collect()
}
