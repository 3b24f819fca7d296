use thiserror::Error;

use crate::models::ResourceKind;

/// Errors surfaced to callers of the fetch layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Non-2xx status, timeout, transport failure or an unreadable body.
    #[error("{resource} upstream unavailable{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    UpstreamUnavailable {
        resource: ResourceKind,
        status: Option<u16>,
        message: String,
    },

    /// The payload is missing a field the canonical model cannot do without.
    #[error("{resource} payload is missing mandatory field `{field}`")]
    UpstreamShapeMismatch { resource: ResourceKind, field: String },

    /// The caller asked for an id the upstream has no record of.
    #[error("{resource} not found: {id}")]
    NotFound { resource: ResourceKind, id: String },
}

impl FetchError {
    pub fn unavailable(resource: ResourceKind, message: impl Into<String>) -> Self {
        FetchError::UpstreamUnavailable {
            resource,
            status: None,
            message: message.into(),
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            FetchError::UpstreamUnavailable { resource, .. }
            | FetchError::UpstreamShapeMismatch { resource, .. }
            | FetchError::NotFound { resource, .. } => *resource,
        }
    }

    /// Re-labels an upstream 404 as a missing record for `id`.
    pub fn not_found_as(self, id: &str) -> Self {
        match self {
            FetchError::UpstreamUnavailable {
                resource,
                status: Some(404),
                ..
            } => FetchError::NotFound {
                resource,
                id: id.to_string(),
            },
            other => other,
        }
    }
}

/// A mandatory field could not be resolved through any of its fallback paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing mandatory field `{field}`")]
pub struct ShapeError {
    pub field: String,
}

impl ShapeError {
    pub fn missing(field: impl Into<String>) -> Self {
        ShapeError {
            field: field.into(),
        }
    }

    pub fn into_fetch(self, resource: ResourceKind) -> FetchError {
        FetchError::UpstreamShapeMismatch {
            resource,
            field: self.field,
        }
    }
}
