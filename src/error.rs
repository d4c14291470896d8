use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request already claimed or gone")]
    AlreadyClaimedOrGone,

    #[error("request is not in the expected state")]
    WrongState,

    #[error("request is claimed by another driver")]
    WrongClaimant,

    #[error("claim has expired")]
    ClaimExpired,

    #[error("invalid trip status transition: {0}")]
    InvalidTransition(String),

    #[error("store unavailable: {0}")]
    TransientStore(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A transactional precondition failed because another actor won the
    /// race. Benign for the orchestrator and scanner; surfaced to drivers
    /// as "request no longer available".
    pub fn is_precondition_race(&self) -> bool {
        matches!(
            self,
            AppError::AlreadyClaimedOrGone
                | AppError::WrongState
                | AppError::WrongClaimant
                | AppError::ClaimExpired
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AlreadyClaimedOrGone
            | AppError::WrongState
            | AppError::WrongClaimant
            | AppError::ClaimExpired => (
                StatusCode::CONFLICT,
                "request no longer available".to_string(),
            ),
            AppError::InvalidTransition(msg) => (
                StatusCode::CONFLICT,
                format!("invalid trip status transition: {msg}"),
            ),
            AppError::TransientStore(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
