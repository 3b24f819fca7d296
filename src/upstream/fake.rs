use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

use super::provider::Upstream;
use crate::error::FetchError;
use crate::models::ResourceKind;

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Json(Value),
    Text(String),
    Status(u16),
    /// Never answers; only useful under a timeout.
    Hang,
}

/// In-memory upstream: URL → canned response, with a call log.
/// Unrouted URLs answer 404.
#[derive(Default)]
pub struct FakeUpstream {
    routes: Mutex<HashMap<String, FakeResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &Url, response: FakeResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.as_str().to_string(), response);
    }

    pub fn json(&self, url: &Url, body: Value) {
        self.route(url, FakeResponse::Json(body));
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &Url) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url.as_str())
            .count()
    }

    async fn respond(&self, resource: ResourceKind, url: &Url) -> Result<FakeResponse, FetchError> {
        self.calls.lock().unwrap().push(url.as_str().to_string());
        let response = self
            .routes
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or(FakeResponse::Status(404));
        match response {
            FakeResponse::Status(status) => Err(FetchError::UpstreamUnavailable {
                resource,
                status: Some(status),
                message: format!("fake status {status}"),
            }),
            FakeResponse::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn get_json(&self, resource: ResourceKind, url: &Url) -> Result<Value, FetchError> {
        match self.respond(resource, url).await? {
            FakeResponse::Json(v) => Ok(v),
            _ => Err(FetchError::unavailable(resource, "body is not JSON")),
        }
    }

    async fn get_text(&self, resource: ResourceKind, url: &Url) -> Result<String, FetchError> {
        match self.respond(resource, url).await? {
            FakeResponse::Text(t) => Ok(t),
            FakeResponse::Json(v) => Ok(v.to_string()),
            _ => Err(FetchError::unavailable(resource, "no body")),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
