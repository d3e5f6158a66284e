//! HTTP collaborator
//!
//! Resolves references against an external service exposing
//! `GET {base}/{id}?select=a,b`. `200` means found, `404` means not found,
//! anything else (or no answer within the timeout) means the collaborator is
//! unavailable.

use std::time::Duration;

use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::collaborator::Collaborator;
use crate::schema::RefTarget;
use crate::types::PlanError;

/// Collaborator reached over HTTP
pub struct HttpCollaborator {
    target: RefTarget,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpCollaborator {
    pub fn new(target: RefTarget, base_url: &str, timeout: Duration) -> Result<Self, PlanError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("emis-plan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlanError::Config(format!("{} client: {}", target, e)))?;

        Ok(Self {
            target,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn unavailable(&self, reason: impl Into<String>) -> PlanError {
        PlanError::CollaboratorUnavailable {
            target: self.target.to_string(),
            reason: reason.into(),
        }
    }

    async fn get(&self, id: ObjectId, select: &[String]) -> Result<Option<reqwest::Response>, PlanError> {
        let url = format!("{}/{}", self.base_url, id.to_hex());
        let select = select.join(",");
        debug!(target_entity = %self.target, url = %url, select = %select, "Resolving reference");

        let response = self
            .http_client
            .get(&url)
            .query(&[("select", select.as_str())])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(target_entity = %self.target, error = %e, "Collaborator request failed");
                self.unavailable(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => Ok(Some(response)),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                warn!(target_entity = %self.target, %status, "Collaborator returned unexpected status");
                Err(self.unavailable(format!("HTTP {} from {}", status, url)))
            }
        }
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    fn target(&self) -> RefTarget {
        self.target
    }

    async fn exists(&self, id: ObjectId) -> Result<bool, PlanError> {
        Ok(self.get(id, &["_id".to_string()]).await?.is_some())
    }

    async fn fetch(&self, id: ObjectId, select: &[String]) -> Result<Option<Document>, PlanError> {
        let Some(response) = self.get(id, select).await? else {
            return Ok(None);
        };

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("invalid response body: {}", e)))?;

        let mut found = bson::to_document(&body)
            .map_err(|e| self.unavailable(format!("response is not a document: {}", e)))?;

        // Keep the service's answer to the requested projection
        let mut projected = Document::new();
        projected.insert("_id", id);
        for field in select {
            if let Some(value) = found.remove(field) {
                projected.insert(field.clone(), value);
            }
        }
        Ok(Some(projected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    const KNOWN: &str = "5f0c8b0e2f8fb814b56fa181";
    const BROKEN: &str = "5f0c8b0e2f8fb814b56fa182";

    async fn party_service(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path().to_string();
        let (status, body) = if path.ends_with(KNOWN) {
            (
                200,
                serde_json::json!({
                    "_id": KNOWN,
                    "type": "Organization",
                    "name": "Red Cross",
                    "email": "ops@example.org",
                    "password": "never-embedded"
                })
                .to_string(),
            )
        } else if path.ends_with(BROKEN) {
            (500, r#"{"error":"boom"}"#.to_string())
        } else {
            (404, r#"{"error":"not found"}"#.to_string())
        };

        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap())
    }

    async fn spawn_party_service() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(party_service))
                        .await;
                });
            }
        });
        addr
    }

    fn collaborator(addr: SocketAddr) -> HttpCollaborator {
        HttpCollaborator::new(
            RefTarget::Party,
            &format!("http://{}/v1/parties/", addr),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_found_and_not_found() {
        let parties = collaborator(spawn_party_service().await);
        assert_eq!(parties.base_url().matches("/v1/parties").count(), 1);
        assert!(!parties.base_url().ends_with('/'));

        let known = ObjectId::parse_str(KNOWN).unwrap();
        assert!(parties.exists(known).await.unwrap());
        assert!(!parties.exists(ObjectId::new()).await.unwrap());

        let party = parties
            .fetch(known, &["type".into(), "name".into(), "email".into(), "mobile".into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(party.get_object_id("_id").unwrap(), known);
        assert_eq!(party.get_str("name").unwrap(), "Red Cross");
        assert!(!party.contains_key("password"));
        assert!(!party.contains_key("mobile"));

        assert!(parties.fetch(ObjectId::new(), &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let parties = collaborator(spawn_party_service().await);
        let err = parties
            .exists(ObjectId::parse_str(BROKEN).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::CollaboratorUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let parties = collaborator(addr);
        let err = parties.exists(ObjectId::new()).await.unwrap_err();
        assert_eq!(err.code(), "COLLABORATOR_UNAVAILABLE");
    }
}
