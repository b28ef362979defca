//! Error types for the control API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crosspost_publish::PublishError;
use crosspost_store::StoreError;

/// Errors that can occur in the control API.
#[derive(Debug, Error)]
pub enum WebError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Publish error.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::CampaignNotFound(_)
        | StoreError::ItemNotFound { .. }
        | StoreError::PostNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidTransition(_) => StatusCode::CONFLICT,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
    }
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::Store(err) => store_status(err),
            WebError::Publish(PublishError::Store(err)) => store_status(err),
            WebError::Publish(PublishError::Validation(_)) => StatusCode::BAD_REQUEST,
            WebError::Publish(PublishError::Credential(_)) => StatusCode::UNAUTHORIZED,
            WebError::Publish(PublishError::Platform(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
