//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo. Each request body is buffered into an
//! [`ApiRequest`] and handed to [`App::dispatch`].

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_LENGTH};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::routes::{self, ApiRequest};
use crate::server::app::App;
use crate::types::PlanError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Bind `listen` and serve `app` until the process exits
pub async fn run(app: &'static App, listen: SocketAddr) -> Result<(), PlanError> {
    let listener = TcpListener::bind(listen).await?;
    info!("emis-plan listening on {}", listener.local_addr()?);
    serve(app, listener).await
}

/// Serve `app` on an already bound listener
pub async fn serve(app: &'static App, listener: TcpListener) -> Result<(), PlanError> {
    for (method, path) in app.routes() {
        debug!("Route {} {}", method, path);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| handle_request(app, addr, req));

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_request(
    app: &'static App,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!("[{}] {} {} ({})", addr, method, target, request_id);

    let mut response = match req.into_body().collect().await {
        Ok(collected) => {
            let api_request = ApiRequest::new(method.clone(), &target, collected.to_bytes());
            app.dispatch(api_request).await
        }
        Err(e) => routes::error_response(&PlanError::BadRequest(format!(
            "Failed to read request body: {}",
            e
        ))),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    debug!(
        "[{}] {} {} -> {} in {:?} ({} bytes)",
        addr,
        method,
        target,
        response.status(),
        started.elapsed(),
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("?"),
    );

    Ok(to_boxed(response))
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::server::app::MEMORY_STORE;
    use crate::services::Services;
    use std::sync::Arc;

    async fn spawn_app() -> SocketAddr {
        let (services, _) = Services::in_memory(ModelConfig::default());
        let services = Arc::new(services);
        let mut app = App::new(Arc::clone(&services), "v1", MEMORY_STORE);
        app.mount(routes::plan_router(Arc::clone(&services)));
        app.mount(routes::activity_router(services));
        let app: &'static App = Box::leak(Box::new(app));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(app, listener));
        addr
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let addr = spawn_app().await;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("http://{}/v1/plans", addr))
            .json(&serde_json::json!({"description": "Flood"}))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status().as_u16(), 201);
        assert_eq!(
            created.headers()["access-control-allow-origin"],
            "*"
        );
        assert!(created.headers().contains_key("x-request-id"));

        let list: serde_json::Value = client
            .get(format!("http://{}/v1/plans?q=flood", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["total"], 1);
    }

    #[tokio::test]
    async fn test_echoes_request_id() {
        let addr = spawn_app().await;
        let response = reqwest::Client::new()
            .get(format!("http://{}/health", addr))
            .header(REQUEST_ID_HEADER, "trace-42")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.headers()["x-request-id"], "trace-42");
    }
}
