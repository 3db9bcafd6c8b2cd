use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ostreeup_core::{wire::ErrorResponse, StoreErr};
use thiserror::Error;

use crate::{queue::QueueErr, staging::StagingErr};

/// Every error surface the Wire Layer can produce, mapped to one HTTP
/// status code each in a single [`IntoResponse`] impl below.
#[derive(Debug, Error)]
pub enum ApiErr {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request body exceeds the 10 MiB limit for this endpoint")]
    PayloadTooLarge,

    #[error(transparent)]
    Queue(#[from] QueueErr),

    #[error(transparent)]
    Staging(#[from] StagingErr),

    #[error(transparent)]
    Store(#[from] StoreErr),
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "api error");

        let status = match &self {
            ApiErr::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErr::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiErr::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErr::Queue(QueueErr::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiErr::Queue(QueueErr::BranchConflict(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErr::Queue(QueueErr::AlreadyFinalizing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErr::Queue(QueueErr::ClosedForUpload(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiErr::Staging(StagingErr::BadChecksum { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiErr::Staging(StagingErr::AlreadyStaged(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiErr::Staging(StagingErr::UnsupportedField(_)) => StatusCode::BAD_REQUEST,
            ApiErr::Staging(StagingErr::InvalidObjectName(_)) => StatusCode::BAD_REQUEST,
            ApiErr::Staging(StagingErr::UnknownChecksumTarget(_)) => StatusCode::BAD_REQUEST,
            ApiErr::Staging(StagingErr::Multipart(_)) => StatusCode::BAD_REQUEST,
            ApiErr::Staging(StagingErr::MissingObject(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErr::Staging(StagingErr::Io(_) | StagingErr::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiErr::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiErr::Queue(QueueErr::BranchConflict(branch)) => {
                format!("branch {branch:?} is already being updated")
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Invoked by `CatchPanicLayer` when a handler panics, returning a
/// JSON error body instead of an empty 500.
pub fn handle_panic(err: Box<dyn std::any::Any + Send>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(details, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: "internal server error".to_string() }),
    )
        .into_response()
}
