use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// Failures reported to management callers. Neither is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no endpoint with ID {endpoint_id} exists (or it's been removed)")]
    NotFound { endpoint_id: String },

    /// Registry is at capacity. The caller may retry after endpoints are
    /// deleted or reaped.
    #[error("there are already {active} endpoints and max is {max}")]
    ResourceExhausted { active: usize, max: usize },
}

impl RegistryError {
    pub(crate) fn not_found(endpoint_id: &str) -> Self {
        Self::NotFound {
            endpoint_id: endpoint_id.to_string(),
        }
    }
}

/// Startup configuration problems. The process refuses to start on any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    NotPositiveInteger { name: &'static str, value: String },

    #[error("{name} is not a valid port: '{value}'")]
    InvalidPort { name: &'static str, value: String },

    #[error("{name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Failure of a management request, as seen by the HTTP client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Registry(RegistryError::ResourceExhausted { .. }) => StatusCode::INSUFFICIENT_STORAGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "management request failed");
        (status, self.to_string()).into_response()
    }
}
