//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;
use crate::export::ExportError;
use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Store(StoreError::InvalidFilter { ref key, ref value }) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid value {:?} for '{}'", value, key),
            ),
            AppError::Store(ref e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to query entries".to_string())
            },
            AppError::Cache(ref e) => {
                tracing::error!("Cache error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to query entries".to_string())
            },
            AppError::Export(ExportError::Store(StoreError::InvalidFilter { ref key, ref value })) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid value {:?} for '{}'", value, key),
            ),
            AppError::Export(ref e) => {
                tracing::error!("Export error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to query entries".to_string())
            },
            AppError::BadRequest(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Conflict(ref message) => (StatusCode::CONFLICT, message.clone()),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
