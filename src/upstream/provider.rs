use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::FetchError;
use crate::models::ResourceKind;

/// Read-only access to the upstream data providers.
///
/// `resource` is carried only so failures can name what was being fetched.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `url` and parse the body as JSON.
    async fn get_json(&self, resource: ResourceKind, url: &Url) -> Result<Value, FetchError>;

    /// GET `url` and return the raw body (HTML pages).
    async fn get_text(&self, resource: ResourceKind, url: &Url) -> Result<String, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
