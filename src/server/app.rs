//! Shared application
//!
//! The application owns the mounted routers and dispatches every request to
//! them. The process-wide instance is built once by [`initialize`] and then
//! only read.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::db::{DocumentStore, MemoryStore, MongoClient, MongoStore};
use crate::package::PackageInfo;
use crate::routes::{self, ApiRequest, EntityRouter};
use crate::services::Services;
use crate::types::PlanError;

/// Storage backend label reported by `/health`
pub const MONGODB_STORE: &str = "mongodb";
pub const MEMORY_STORE: &str = "memory";

/// Routers mounted under a version prefix
pub struct App {
    services: Arc<Services>,
    api_version: String,
    store_kind: &'static str,
    package: PackageInfo,
    routers: Vec<EntityRouter>,
}

impl App {
    pub fn new(services: Arc<Services>, api_version: &str, store_kind: &'static str) -> Self {
        Self {
            services,
            api_version: api_version.to_string(),
            store_kind,
            package: PackageInfo::current(),
            routers: Vec::new(),
        }
    }

    /// Mount a router. A router whose name is already mounted is ignored and
    /// `false` is returned.
    pub fn mount(&mut self, router: EntityRouter) -> bool {
        if self.routers.iter().any(|r| r.name() == router.name()) {
            debug!("Router '{}' already mounted", router.name());
            return false;
        }
        info!(
            "Mounted router '{}' ({} routes)",
            router.name(),
            router.routes().len()
        );
        self.routers.push(router);
        true
    }

    pub fn mounted(&self) -> Vec<&str> {
        self.routers.iter().map(|r| r.name()).collect()
    }

    /// Every registered route, with the version prefix
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routers
            .iter()
            .flat_map(|r| r.routes())
            .map(|(method, path)| (method, format!("/{}{}", self.api_version, path)))
            .collect()
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    /// Create the indexes of every mounted resource
    pub async fn ensure_indexes(&self) -> Result<(), PlanError> {
        for router in &self.routers {
            router.ensure_indexes().await?;
        }
        Ok(())
    }

    /// Route a buffered request to its handler
    pub async fn dispatch(&self, req: ApiRequest) -> Response<Full<Bytes>> {
        if req.method == Method::OPTIONS {
            return routes::preflight_response();
        }

        let segments = req.segments();
        match (&req.method, segments.as_slice()) {
            (&Method::GET, []) => routes::package_info(&self.package),
            (&Method::GET, ["health"]) => routes::health_check(self.store_kind),
            (&Method::GET, [version, "info"]) if *version == self.api_version => {
                routes::package_info(&self.package)
            }
            (_, [version, rest @ ..]) if *version == self.api_version && !rest.is_empty() => {
                for router in &self.routers {
                    if let Some(response) = router.handle(&req, rest).await {
                        return response;
                    }
                }
                routes::not_found_response(&req.path)
            }
            _ => routes::not_found_response(&req.path),
        }
    }
}

static APP: OnceCell<App> = OnceCell::const_new();

/// Connect to MongoDB, falling back to an in-memory store in dev mode
pub async fn connect_store(args: &Args) -> Result<(Arc<dyn DocumentStore>, &'static str), PlanError> {
    match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => Ok((Arc::new(MongoStore::new(client)), MONGODB_STORE)),
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            Ok((Arc::new(MemoryStore::new()), MEMORY_STORE))
        }
        Err(e) => Err(e),
    }
}

/// Build an application over `store` with both routers mounted
pub async fn build_app(
    args: &Args,
    store: Arc<dyn DocumentStore>,
    store_kind: &'static str,
) -> Result<App, PlanError> {
    let services = Arc::new(Services::from_args(args, store)?);
    let mut app = App::new(Arc::clone(&services), &args.api_version, store_kind);
    app.mount(routes::plan_router(Arc::clone(&services)));
    app.mount(routes::activity_router(services));
    app.ensure_indexes().await?;
    Ok(app)
}

/// Initialize the process-wide application. Later calls return the first
/// instance.
pub async fn initialize(args: &Args) -> Result<&'static App, PlanError> {
    APP.get_or_try_init(|| async {
        let (store, kind) = connect_store(args).await?;
        build_app(args, store, kind).await
    })
    .await
}

/// [`initialize`] over an already connected store
pub async fn initialize_with(
    args: &Args,
    store: Arc<dyn DocumentStore>,
    store_kind: &'static str,
) -> Result<&'static App, PlanError> {
    APP.get_or_try_init(|| build_app(args, store, store_kind)).await
}

/// The process-wide application, once initialized
pub fn app() -> Option<&'static App> {
    APP.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use clap::Parser;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use serde_json::{json, Value};

    fn test_app() -> (App, Arc<MemoryStore>) {
        let (services, store) = Services::in_memory(ModelConfig::default());
        let services = Arc::new(services);
        let mut app = App::new(Arc::clone(&services), "v1", MEMORY_STORE);
        app.mount(routes::plan_router(Arc::clone(&services)));
        app.mount(routes::activity_router(services));
        (app, store)
    }

    async fn call(app: &App, method: Method, target: &str, body: Value) -> (StatusCode, Value) {
        let body = if body.is_null() { Bytes::new() } else { Bytes::from(body.to_string()) };
        let response = app.dispatch(ApiRequest::new(method, target, body)).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_mount_is_idempotent() {
        let (mut app, _) = test_app();
        let before = app.routes();

        let services = Arc::clone(app.services());
        assert!(!app.mount(routes::plan_router(Arc::clone(&services))));
        assert!(!app.mount(routes::activity_router(services)));

        let after = app.routes();
        assert_eq!(before, after);
        assert_eq!(app.mounted(), vec!["plan", "activity"]);

        let mut unique = after.clone();
        unique.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        unique.dedup();
        assert_eq!(unique.len(), after.len());
    }

    #[tokio::test]
    async fn test_create_then_get_plan() {
        let (app, store) = test_app();
        let owner = store
            .insert("parties", bson::doc! { "type": "Organization", "name": "Red Cross" })
            .await
            .unwrap();

        let (status, created) = call(
            &app,
            Method::POST,
            "/v1/plans",
            json!({"description": "Flood response", "owner": owner.to_hex()}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created.get("publishedAt").is_none());

        let target = format!("/v1/plans/{}", created["_id"].as_str().unwrap());
        let (status, fetched) = call(&app, Method::GET, &target, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["owner"]["name"], "Red Cross");
        assert!(fetched.get("publishedAt").is_none());
    }

    #[tokio::test]
    async fn test_error_kinds_reach_the_client() {
        let (app, store) = test_app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/plans",
            json!({"boundary": bson::oid::ObjectId::new().to_hex()}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "REFERENCE_NOT_FOUND");
        assert_eq!(body["field"], "boundary");
        assert_eq!(store.raw_count("plans"), 0);

        let (status, body) = call(&app, Method::POST, "/v1/activities", json!({"number": "one"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["errors"]["number"].is_string());

        let (status, _) = call(&app, Method::GET, "/v1/plans/not-an-id", Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::GET, "/v2/plans", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::GET, "/v1/parties", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    struct PartyDirectoryDown;

    #[async_trait::async_trait]
    impl crate::references::Collaborator for PartyDirectoryDown {
        fn target(&self) -> crate::schema::RefTarget {
            crate::schema::RefTarget::Party
        }

        async fn exists(&self, _id: bson::oid::ObjectId) -> Result<bool, PlanError> {
            Err(PlanError::CollaboratorUnavailable {
                target: "Party".to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn fetch(
            &self,
            id: bson::oid::ObjectId,
            select: &[String],
        ) -> Result<Option<bson::Document>, PlanError> {
            let _ = select;
            self.exists(id).await.map(|_| None)
        }
    }

    #[tokio::test]
    async fn test_unavailable_collaborator_is_not_a_missing_reference() {
        let (mut services, store) = Services::in_memory(ModelConfig::default());
        services.resolver = services.resolver.clone().register(Arc::new(PartyDirectoryDown));
        let services = Arc::new(services);
        let mut app = App::new(Arc::clone(&services), "v1", MEMORY_STORE);
        app.mount(routes::plan_router(services));

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/plans",
            json!({"owner": bson::oid::ObjectId::new().to_hex()}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "COLLABORATOR_UNAVAILABLE");
        assert_eq!(store.raw_count("plans"), 0);

        let (status, _) = call(&app, Method::POST, "/v1/plans", json!({"description": "Drill"})).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_nested_lists_and_soft_delete() {
        let (app, _) = test_app();
        let (_, plan) = call(&app, Method::POST, "/v1/plans", json!({"description": "Flood"})).await;
        let plan_id = plan["_id"].as_str().unwrap().to_string();

        for (number, name) in [(1, "Warn"), (2, "Evacuate")] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/v1/activities",
                json!({"plan": plan_id, "name": name, "number": number}),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let target = format!("/v1/plans/{}/activities?sort=number", plan_id);
        let (status, body) = call(&app, Method::GET, &target, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"][0]["name"], "Warn");
        assert_eq!(body["data"][0]["plan"]["description"], "Flood");

        let activity_id = body["data"][1]["_id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/v1/activities/{}", activity_id),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, Method::GET, &target, Value::Null).await;
        assert_eq!(body["total"], 1);
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/v1/activities/{}", activity_id),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_and_put_merge() {
        let (app, _) = test_app();
        let (_, plan) = call(&app, Method::POST, "/v1/plans", json!({"description": "Flood"})).await;
        let target = format!("/v1/plans/{}", plan["_id"].as_str().unwrap());

        let (status, patched) = call(&app, Method::PATCH, &target, json!({"publishedAt": "2024-06-01"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["description"], "Flood");

        let (_, put) = call(&app, Method::PUT, &target, json!({"description": "Flood response"})).await;
        assert_eq!(put["description"], "Flood response");
        assert!(put["publishedAt"].as_str().unwrap().starts_with("2024-06-01T00:00:00"));
    }

    #[tokio::test]
    async fn test_info_health_schema_and_preflight() {
        let (app, _) = test_app();

        let (status, root) = call(&app, Method::GET, "/", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(root["name"], "emis-plan");
        let (_, info) = call(&app, Method::GET, "/v1/info", Value::Null).await;
        assert_eq!(root, info);

        let (_, health) = call(&app, Method::GET, "/health", Value::Null).await;
        assert_eq!(health["store"], "memory");

        let (status, schema) = call(&app, Method::GET, "/v1/plans/schema", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schema["modelName"], "Plan");
        assert_eq!(schema["fields"][0]["name"], "incidentType");

        let (status, _) = call(&app, Method::OPTIONS, "/v1/plans", Value::Null).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_initialize_returns_one_instance() {
        let args = Args::parse_from(["emis-plan"]);
        let first = tokio_test::assert_ok!(
            initialize_with(&args, Arc::new(MemoryStore::new()), MEMORY_STORE).await
        );
        let second = tokio_test::assert_ok!(
            initialize_with(&args, Arc::new(MemoryStore::new()), MEMORY_STORE).await
        );

        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(app().unwrap(), first));
        assert_eq!(first.mounted(), vec!["plan", "activity"]);
    }
}
