use crate::core::RateError;
use crate::core::validator::Validator;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation errors")]
    Validation(Validator),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(v) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation errors", "message": v }),
            ),
            Self::Rate(e) if e.is_not_available() => {
                (StatusCode::NOT_FOUND, json!({ "error": e.to_string() }))
            }
            Self::Rate(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            ),
            Self::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("{e:#}") }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
