//! Health and package information endpoints
//!
//! - `/health` - liveness probe, 200 while the process serves requests
//! - `/` and `/<version>/info` - package descriptor

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::json_response;
use crate::package::PackageInfo;

/// Liveness response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Active storage backend: "mongodb" or "memory"
    pub store: &'static str,
    pub timestamp: String,
}

/// Handle liveness probe (/health)
pub fn health_check(store: &'static str) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        store,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}

/// Handle package descriptor (/ and /<version>/info)
pub fn package_info(info: &PackageInfo) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, info)
}
