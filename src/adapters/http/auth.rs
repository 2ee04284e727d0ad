use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::adapters::http::{error::ApiError, state::ApiState};
use crate::domain::errors::DomainError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects the request with 403 before any handler runs unless `X-API-Key`
/// matches the configured secret.
pub async fn require_api_key(State(st): State<ApiState>, req: Request, next: Next) -> Response {
    let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(&*st.api_key) {
        tracing::warn!(path = %req.uri().path(), has_key = provided.is_some(), "api key rejected");
        return ApiError::from(DomainError::Auth).into_response();
    }
    next.run(req).await
}
