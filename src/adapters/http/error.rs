use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use tracing::{error, warn};

use crate::application::dto::ErrorResponse;
use crate::domain::errors::DomainError;

/// A failed API call: status plus the `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    /// `/predict` collapses every failure into a 500.
    pub fn prediction_failed(e: DomainError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("Prediction failed: {e}"),
        }
    }
}

pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::Auth => StatusCode::FORBIDDEN,
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Inference(_) | DomainError::LabelResolution(_) | DomainError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self { status: status_for(&e), detail: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            warn!(status = %self.status, detail = %self.detail, "request rejected");
        }
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}
