pub mod embedded;
pub mod endpoints;
pub mod http;
pub mod provider;

pub use embedded::{extract_embedded_json, ESPN_STATE_MARKER};
pub use endpoints::Endpoints;
pub use http::HttpUpstream;
pub use provider::Upstream;

#[cfg(test)]
pub mod fake;
