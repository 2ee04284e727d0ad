use axum::{extract::{Multipart, State}, Json};

use crate::adapters::http::{error::ApiError, state::ApiState, upload::read_upload};
use crate::application::dto::{HealthResponse, PredictionsResponse, WelcomeResponse};
use crate::config::{APP_NAME, VERSION};
use crate::domain::{
    detection::DetectionResponse,
    errors::DomainError,
    request::DetectionParams,
};

pub async fn home() -> Json<WelcomeResponse> {
    Json(WelcomeResponse { message: format!("Welcome to {APP_NAME} API v{VERSION}") })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// `POST /predict`: one `file` part, default thresholds.
pub async fn predict(
    State(st): State<ApiState>,
    multipart: Multipart,
) -> Result<Json<PredictionsResponse>, ApiError> {
    let form = read_upload(multipart).await.map_err(ApiError::prediction_failed)?;
    let file = form
        .file
        .ok_or_else(|| ApiError::prediction_failed(DomainError::invalid("file", "no image uploaded")))?;

    let detections = st.detection.predict(file.bytes).await.map_err(ApiError::prediction_failed)?;
    Ok(Json(detections.into()))
}

/// `POST /detect`: optional `file` part plus an optional `request` part with
/// the JSON detection parameters.
pub async fn detect(
    State(st): State<ApiState>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    let form = read_upload(multipart).await?;

    let params = match form.params.as_deref() {
        Some(text) => serde_json::from_str::<DetectionParams>(text)
            .map_err(|e| DomainError::invalid("request", e.to_string()))?,
        None => DetectionParams::default(),
    };
    let request = params.validate(form.file.map(|f| f.bytes))?;

    Ok(Json(st.detection.detect(request).await?))
}
