//! Error types for the recipe service
//!
//! This module defines custom error types used throughout the application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::codec::DeserializationError;
use crate::middleware::rate_limiter::{rate_limit_exceeded_response, RateLimitInfo};
use crate::store::StoreError;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {} invalid field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Rate limit exceeded: {} requests allowed", .0.limit)]
    RateLimitExceeded(RateLimitInfo),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Corrupt cache entry {key}: {source}")]
    Deserialization {
        key: String,
        #[source]
        source: DeserializationError,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a single-field validation failure
    pub fn invalid(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    /// Wrap a relational failure with the operation that produced it
    pub fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| AppError::Database { operation, source }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details for rate limiting and validation
#[derive(Debug, Default, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

pub(crate) fn error_body(
    status: StatusCode,
    code: &str,
    message: String,
    details: Option<ErrorDetails>,
) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.to_string(),
            message,
            details,
        },
    };

    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(fields) => error_body(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Request validation failed".to_string(),
                Some(ErrorDetails {
                    fields: Some(fields),
                    ..Default::default()
                }),
            ),
            AppError::RateLimitExceeded(info) => rate_limit_exceeded_response(&info),
            AppError::NotFound(msg) => {
                error_body(StatusCode::NOT_FOUND, "NOT_FOUND", msg, None)
            }
            AppError::StoreUnavailable(ref e) => {
                tracing::error!(error = %e, "Key-value store failure");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_UNAVAILABLE",
                    "Cache service error".to_string(),
                    None,
                )
            }
            AppError::Database {
                operation,
                ref source,
            } => {
                tracing::error!(operation, error = %source, "Database failure");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Deserialization { ref key, ref source } => {
                tracing::error!(key = %key, error = %source, "Cached value could not be decoded");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CACHE_CORRUPT",
                    "Cache service error".to_string(),
                    None,
                )
            }
            AppError::Internal(ref e) => {
                tracing::error!(error = %e, "Internal error");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
