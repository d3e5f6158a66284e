//! Transport-independent request

use bytes::Bytes;
use hyper::Method;
use serde_json::Value;

use crate::types::PlanError;

/// A buffered API request: method, path, raw query string and body
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Bytes,
}

impl ApiRequest {
    /// Build from a request target such as `/v1/plans?limit=5`
    pub fn new(method: Method, target: &str, body: impl Into<Bytes>) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            body: body.into(),
        }
    }

    /// Non-empty path segments
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Parse the body as JSON; an empty body is an empty object
    pub fn json(&self) -> Result<Value, PlanError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}
