//! Error types for the cache engine and its HTTP surface
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for caches, limiters and the sidecar API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (or no longer visible) in a cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A cache or limiter was built with an impossible configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A rate-limit tier name that was never configured
    #[error("Unknown rate-limit tier: {0}")]
    UnknownTier(String),

    /// Value could not be encoded or decoded by the compression codec
    #[error("Codec failure: {0}")]
    Codec(String),

    /// Upstream lookup failed and no cached fallback existed
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Codec(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::LookupFailed(_) => StatusCode::BAD_GATEWAY,
            CacheError::InvalidConfig(_)
            | CacheError::UnknownTier(_)
            | CacheError::Codec(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the engine.
pub type Result<T> = std::result::Result<T, CacheError>;
