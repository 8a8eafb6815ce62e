use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use plume_types::api::{ErrorResponse, FieldError};

/// Request-level failures. Every variant terminates in a structured
/// response; nothing here may crash the request path.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Conflict(String),

    /// Wrong password and unknown username collapse into this one variant
    /// so the response never reveals which accounts exist.
    #[error("invalid username or password")]
    Authentication,

    #[error("authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "validation failed".into(),
                    fields,
                },
            ),
            Self::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: message,
                    fields: vec![],
                },
            ),
            Self::Authentication => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "invalid username or password".into(),
                    fields: vec![],
                },
            ),
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "authentication required".into(),
                    fields: vec![],
                },
            ),
            Self::Store(err) => {
                error!("store failure: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal server error".into(),
                        fields: vec![],
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
