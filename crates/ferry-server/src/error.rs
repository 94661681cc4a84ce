//! Server and API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ferry_meta::MetaError;
use ferry_store::StoreError;
use ferry_upload::UploadError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while configuring or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub code: String,
    pub message: String,
}

/// Error returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str) {
    match e {
        StoreError::ContainerNotFound(_) | StoreError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        StoreError::ContainerExists(_) | StoreError::ContainerNotEmpty(_) => {
            (StatusCode::CONFLICT, "conflict")
        }
        StoreError::PreconditionFailed { .. } => (StatusCode::CONFLICT, "precondition_failed"),
        StoreError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "invalid_key"),
        StoreError::Io(_) | StoreError::Backend(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
        }
        StoreError::ComposeUnsupported(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Store(e) => store_status(e),
            Self::Upload(e) => match e {
                UploadError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                UploadError::ContainerNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                UploadError::TargetConflict { .. } => (StatusCode::CONFLICT, "target_conflict"),
                UploadError::MergeConflict { .. } => (StatusCode::CONFLICT, "merge_conflict"),
                UploadError::Backend(e) => store_status(e),
                UploadError::PartUploadFailed { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "part_upload_failed")
                }
                UploadError::AssemblyFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "assembly_failed")
                }
                UploadError::Metadata(_) if e.is_retryable() => {
                    (StatusCode::SERVICE_UNAVAILABLE, "metadata_unavailable")
                }
                UploadError::Metadata(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metadata_error"),
            },
        }
    }

    pub fn code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_map_to_statuses() {
        let cases = [
            (UploadError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (UploadError::ContainerNotFound("b".into()), StatusCode::NOT_FOUND),
            (
                UploadError::MergeConflict {
                    index: 1,
                    name: "p".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                UploadError::Backend(StoreError::Backend("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                UploadError::AssemblyFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StoreError::ContainerExists("b".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::not_found("b", "o")).code(),
            "not_found"
        );
    }
}
