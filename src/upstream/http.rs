use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::provider::Upstream;
use crate::error::FetchError;
use crate::models::ResourceKind;

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; courtside/", env!("CARGO_PKG_VERSION"), ")");

/// reqwest-backed upstream. One client, shared connection pool.
#[derive(Clone)]
pub struct HttpUpstream {
    http: Client,
    /// Host that receives the `Authorization` header, and the key to send.
    api_key: Option<(String, String)>,
}

impl HttpUpstream {
    pub fn new(timeout: Duration, balldontlie: &Url, balldontlie_key: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        let api_key = match (balldontlie.host_str(), balldontlie_key) {
            (Some(host), Some(key)) => Some((host.to_string(), key)),
            _ => None,
        };
        Ok(HttpUpstream { http, api_key })
    }

    async fn send(&self, resource: ResourceKind, url: &Url, accept: &str) -> Result<Response, FetchError> {
        debug!("GET {} ({})", url, resource);
        let mut request = self.http.get(url.clone()).header("Accept", accept);
        if let Some((host, key)) = &self.api_key {
            if url.host_str() == Some(host.as_str()) {
                request = request.header("Authorization", key);
            }
        }

        let resp = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            warn!("{} request to {} failed: {}", resource, url, message);
            FetchError::unavailable(resource, message)
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!("{} upstream returned {} for {}", resource, status, url);
            return Err(FetchError::UpstreamUnavailable {
                resource,
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get_json(&self, resource: ResourceKind, url: &Url) -> Result<Value, FetchError> {
        let resp = self.send(resource, url, "application/json").await?;
        resp.json::<Value>().await.map_err(|e| {
            warn!("{} body from {} is not JSON: {}", resource, url, e);
            FetchError::unavailable(resource, format!("body is not JSON: {e}"))
        })
    }

    async fn get_text(&self, resource: ResourceKind, url: &Url) -> Result<String, FetchError> {
        let resp = self.send(resource, url, "text/html,application/xhtml+xml").await?;
        resp.text()
            .await
            .map_err(|e| FetchError::unavailable(resource, format!("failed to read body: {e}")))
    }

    fn name(&self) -> &str {
        "http"
    }
}
