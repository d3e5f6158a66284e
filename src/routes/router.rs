//! Entity routers
//!
//! A router groups the resources of one area of the API under a name, so the
//! application can mount it exactly once. Paths are relative to the version
//! prefix:
//!
//! - `/<resource>` - GET list, POST create
//! - `/<resource>/schema` - GET field manifest
//! - `/<resource>/:id` - GET, PUT, PATCH, DELETE
//! - `/<parent>/:id/<resource>` - GET list of children

use std::sync::Arc;

use bson::Bson;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};

use super::request::ApiRequest;
use super::response::{error_response, json_response, method_not_allowed};
use crate::actions::{list_params, parse_id, ResourceHandler, Resource};
use crate::db::schemas::{ActivityDoc, PlanDoc, ProcedureDoc, PLAN_RESOURCE};
use crate::hooks;
use crate::services::Services;
use crate::types::PlanError;

/// Name `plan_router` is mounted under
pub const PLAN_ROUTER: &str = "plan";

/// Name `activity_router` is mounted under
pub const ACTIVITY_ROUTER: &str = "activity";

/// Children of a parent resource, listed through the parent's path
#[derive(Debug, Clone)]
struct Nested {
    parent_resource: String,
    parent_collection: String,
    child_resource: String,
    field: String,
}

/// Named group of resource routes
pub struct EntityRouter {
    name: String,
    services: Arc<Services>,
    resources: Vec<Arc<dyn ResourceHandler>>,
    nested: Vec<Nested>,
}

impl EntityRouter {
    pub fn new(name: &str, services: Arc<Services>) -> Self {
        Self {
            name: name.to_string(),
            services,
            resources: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn resource(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resources.push(handler);
        self
    }

    /// Serve `/<parent>/:id/<child>` as the child list filtered on `field`
    pub fn nested(mut self, parent_resource: &str, parent_collection: &str, child_resource: &str, field: &str) -> Self {
        self.nested.push(Nested {
            parent_resource: parent_resource.to_string(),
            parent_collection: parent_collection.to_string(),
            child_resource: child_resource.to_string(),
            field: field.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &[Arc<dyn ResourceHandler>] {
        &self.resources
    }

    /// Route patterns served, relative to the version prefix
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes = Vec::new();
        for handler in &self.resources {
            let base = format!("/{}", handler.resource());
            let item = format!("{}/:id", base);
            routes.push((Method::GET, base.clone()));
            routes.push((Method::POST, base.clone()));
            routes.push((Method::GET, format!("{}/schema", base)));
            for method in [Method::GET, Method::PUT, Method::PATCH, Method::DELETE] {
                routes.push((method, item.clone()));
            }
        }
        for nested in &self.nested {
            routes.push((
                Method::GET,
                format!("/{}/:id/{}", nested.parent_resource, nested.child_resource),
            ));
        }
        routes
    }

    /// Ensure indexes for every resource of this router
    pub async fn ensure_indexes(&self) -> Result<(), PlanError> {
        for handler in &self.resources {
            handler.ensure_indexes().await?;
        }
        Ok(())
    }

    fn handler(&self, resource: &str) -> Option<&Arc<dyn ResourceHandler>> {
        self.resources.iter().find(|h| h.resource() == resource)
    }

    /// Handle a request whose path, after the version prefix, is `segments`.
    ///
    /// Returns `None` when no route of this router matches the path.
    pub async fn handle(&self, req: &ApiRequest, segments: &[&str]) -> Option<Response<Full<Bytes>>> {
        match segments {
            [resource] => {
                let handler = self.handler(resource)?;
                Some(match req.method {
                    Method::GET => respond(StatusCode::OK, self.list(handler.as_ref(), req, None).await),
                    Method::POST => {
                        let result = match req.json() {
                            Ok(body) => handler.create(&body).await,
                            Err(e) => Err(e),
                        };
                        respond(StatusCode::CREATED, result)
                    }
                    _ => method_not_allowed("GET, POST, OPTIONS"),
                })
            }

            [resource, "schema"] => {
                let handler = self.handler(resource)?;
                Some(match req.method {
                    Method::GET => json_response(StatusCode::OK, handler.schema()),
                    _ => method_not_allowed("GET, OPTIONS"),
                })
            }

            [resource, id] => {
                let handler = self.handler(resource)?;
                let result = match req.method {
                    Method::GET => handler.get(id).await,
                    Method::PUT | Method::PATCH => match req.json() {
                        Ok(body) => handler.update(id, &body).await,
                        Err(e) => Err(e),
                    },
                    Method::DELETE => handler.delete(id).await,
                    _ => return Some(method_not_allowed("GET, PUT, PATCH, DELETE, OPTIONS")),
                };
                Some(respond(StatusCode::OK, result))
            }

            [parent, id, child] => {
                let nested = self
                    .nested
                    .iter()
                    .find(|n| n.parent_resource == *parent && n.child_resource == *child)?;
                let handler = self.handler(child)?;
                Some(match req.method {
                    Method::GET => respond(
                        StatusCode::OK,
                        self.list_children(handler.as_ref(), nested, id, req).await,
                    ),
                    _ => method_not_allowed("GET, OPTIONS"),
                })
            }

            _ => None,
        }
    }

    async fn list(
        &self,
        handler: &dyn ResourceHandler,
        req: &ApiRequest,
        scope: Option<(String, Bson)>,
    ) -> Result<serde_json::Value, PlanError> {
        let mut params = list_params(&req.query, handler.schema(), self.services.limits)?;
        if let Some((field, value)) = scope {
            params.query.filters.retain(|(f, _)| *f != field);
            params.query.filters.push((field, value));
        }
        handler.list(params).await
    }

    async fn list_children(
        &self,
        handler: &dyn ResourceHandler,
        nested: &Nested,
        parent_id: &str,
        req: &ApiRequest,
    ) -> Result<serde_json::Value, PlanError> {
        let parent = parse_id(parent_id)?;
        if !self.services.store.exists(&nested.parent_collection, parent).await? {
            return Err(PlanError::NotFound(format!("{} {}", nested.parent_resource, parent)));
        }
        self.list(handler, req, Some((nested.field.clone(), Bson::ObjectId(parent))))
            .await
    }
}

fn respond(status: StatusCode, result: Result<serde_json::Value, PlanError>) -> Response<Full<Bytes>> {
    match result {
        Ok(body) => json_response(status, &body),
        Err(e) => error_response(&e),
    }
}

/// Router serving plans
pub fn plan_router(services: Arc<Services>) -> EntityRouter {
    let plans = Resource::<PlanDoc>::new(Arc::clone(&services));
    EntityRouter::new(PLAN_ROUTER, services).resource(Arc::new(plans))
}

/// Router serving activities and procedures, including the per-plan and
/// per-activity child lists
pub fn activity_router(services: Arc<Services>) -> EntityRouter {
    let activities = Resource::<ActivityDoc>::new(Arc::clone(&services)).with_hooks(hooks::activity_hooks());
    let procedures = Resource::<ProcedureDoc>::new(Arc::clone(&services)).with_hooks(hooks::procedure_hooks());

    let plan_collection = services.models.plan_collection_name.clone();
    let activity_collection = services.models.activity_collection_name.clone();
    let activity_resource = activities.schema().resource.clone();
    let procedure_resource = procedures.schema().resource.clone();

    EntityRouter::new(ACTIVITY_ROUTER, services)
        .resource(Arc::new(activities))
        .resource(Arc::new(procedures))
        .nested(PLAN_RESOURCE, &plan_collection, &activity_resource, "plan")
        .nested(&activity_resource, &activity_collection, &procedure_resource, "activity")
}
