//! Unified API error handling
//!
//! Every endpoint reports failures with the same JSON body.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::StoreError;
use crate::service::EngineError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Analysis not found (404)
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Claim extraction failed (500)
    #[error("Claim extraction failed: {0}")]
    Extraction(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::AnalysisNotFound(_) => "analysis_not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Extraction(_) => "extraction_failed",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AnalysisNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(
                error_type = body.error.as_str(),
                status = status.as_u16(),
                request_id = body.request_id.as_str(),
                message = %self,
                "API error"
            );
        } else {
            tracing::debug!(
                error_type = body.error.as_str(),
                status = status.as_u16(),
                message = %self,
                "Request rejected"
            );
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::EmptyInput => ApiError::BadRequest(err.to_string()),
            EngineError::Extraction(e) => ApiError::Extraction(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::AnalysisNotFound(id),
            _ => ApiError::Database(err.to_string()),
        }
    }
}

/// Map body deserialization failures onto the unified error format
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}
