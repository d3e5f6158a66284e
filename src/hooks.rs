//! Pre-validation hooks
//!
//! A resource runs its entity's own [`Entity::pre_validate`] and then every
//! registered [`PreValidate`] hook, in registration order. Hooks see the
//! coerced document before its references are checked, so they may fill in
//! or cross-check reference fields. The first error stops the write.
//!
//! [`Entity::pre_validate`]: crate::db::Entity::pre_validate

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use tracing::debug;

use crate::db::schemas::{ActivityDoc, ProcedureDoc};
use crate::db::Entity;
use crate::services::Services;
use crate::types::PlanError;

/// Asynchronous pre-validation step for documents of type `T`
///
/// `previous` is the stored version on update and `None` on create.
#[async_trait]
pub trait PreValidate<T: Entity>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, doc: &mut T, previous: Option<&T>, services: &Services) -> Result<(), PlanError>;
}

async fn plan_incident_type(services: &Services, plan: ObjectId) -> Result<Option<ObjectId>, PlanError> {
    let plan = services
        .store
        .find_by_id(
            &services.models.plan_collection_name,
            plan,
            Some(&["incidentType".to_string()]),
        )
        .await?;
    Ok(plan.and_then(|p| p.get_object_id("incidentType").ok()))
}

/// Copy the plan's incident type onto an activity that has none.
///
/// An activity moved to another plan drops an incident type it had inherited
/// from the old plan and inherits again from the new one.
pub struct InheritIncidentType;

#[async_trait]
impl PreValidate<ActivityDoc> for InheritIncidentType {
    fn name(&self) -> &'static str {
        "inherit_incident_type"
    }

    async fn run(
        &self,
        activity: &mut ActivityDoc,
        previous: Option<&ActivityDoc>,
        services: &Services,
    ) -> Result<(), PlanError> {
        if let Some(previous) = previous {
            let moved = previous.plan != activity.plan;
            let untouched = previous.incident_type == activity.incident_type;
            if moved
                && untouched
                && activity.incident_type.is_some()
                && activity.incident_type == plan_incident_type(services, previous.plan).await?
            {
                debug!("Activity left plan {}, dropping inherited incident type", previous.plan);
                activity.incident_type = None;
            }
        }

        if activity.incident_type.is_some() {
            return Ok(());
        }

        if let Some(incident_type) = plan_incident_type(services, activity.plan).await? {
            debug!("Activity inherits incident type {} from plan {}", incident_type, activity.plan);
            activity.incident_type = Some(incident_type);
        }
        Ok(())
    }
}

/// Keep a procedure on the same plan as its activity.
///
/// A procedure moved to another activity takes the new activity's plan unless
/// the plan was changed in the same write.
pub struct AlignPlanWithActivity;

#[async_trait]
impl PreValidate<ProcedureDoc> for AlignPlanWithActivity {
    fn name(&self) -> &'static str {
        "align_plan_with_activity"
    }

    async fn run(
        &self,
        procedure: &mut ProcedureDoc,
        previous: Option<&ProcedureDoc>,
        services: &Services,
    ) -> Result<(), PlanError> {
        if let Some(previous) = previous {
            if previous.activity != procedure.activity && previous.plan == procedure.plan {
                procedure.plan = None;
            }
        }

        let activity = services
            .store
            .find_by_id(
                &services.models.activity_collection_name,
                procedure.activity,
                Some(&["plan".to_string()]),
            )
            .await?;

        // A dangling activity is reported by the reference check
        let Some(activity) = activity else {
            return Ok(());
        };

        match (procedure.plan, activity.get_object_id("plan").ok()) {
            (None, Some(plan)) => procedure.plan = Some(plan),
            (Some(given), Some(plan)) if given != plan => {
                return Err(PlanError::invalid("plan", "must match the plan of the activity"));
            }
            _ => {}
        }

        if procedure.plan.is_none() {
            return Err(PlanError::invalid("plan", "is required"));
        }
        Ok(())
    }
}

pub fn activity_hooks() -> Vec<Arc<dyn PreValidate<ActivityDoc>>> {
    vec![Arc::new(InheritIncidentType)]
}

pub fn procedure_hooks() -> Vec<Arc<dyn PreValidate<ProcedureDoc>>> {
    vec![Arc::new(AlignPlanWithActivity)]
}
