//! HTTP error mapping.
//!
//! Every failure a handler can produce is an [`ApiError`]. Errors render as
//! plain text bodies; storage faults are logged in full and answered with a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use docgate_core::error::DocumentStoreError;

/// Result type for gateway handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed document (or image) does not exist
    #[error("{0}")]
    NotFound(&'static str),

    /// The request failed validation before reaching the store
    #[error("{0}")]
    BadRequest(String),

    /// No route matches the verb and path
    #[error("Resource not found!")]
    RouteNotMatched,

    /// The store failed to execute the operation
    #[error("Internal Server Error")]
    Storage(#[source] DocumentStoreError),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::RouteNotMatched => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DocumentStoreError> for ApiError {
    fn from(err: DocumentStoreError) -> Self {
        if !err.is_validation() {
            return ApiError::Storage(err);
        }

        match err {
            DocumentStoreError::InvalidDocument(reason) => ApiError::BadRequest(reason),
            _ => ApiError::BadRequest("Invalid document identifier".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Storage(err) => error!(error = %err, "storage operation failed"),
            ApiError::BadRequest(reason) => warn!(%reason, "rejected request"),
            ApiError::NotFound(_) | ApiError::RouteNotMatched => {}
        }

        (self.status_code(), self.to_string()).into_response()
    }
}
