use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::adapters::http::{pages, state::WebState, upload::read_upload};
use crate::domain::{
    errors::{DomainError, DomainResult},
    request::DetectionRequest,
};

pub async fn index() -> Html<String> {
    Html(pages::index())
}

/// Stores the upload first so the results page can reference it, then runs
/// detection at default thresholds.
pub async fn predict(State(st): State<WebState>, multipart: Multipart) -> Response {
    match predict_inner(&st, multipart).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "prediction failed");
            let page = pages::error(&format!("Prediction failed: {e}"));
            (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
        }
    }
}

async fn predict_inner(st: &WebState, multipart: Multipart) -> DomainResult<String> {
    let form = read_upload(multipart).await?;
    let file = form.file.ok_or_else(|| DomainError::invalid("file", "no image uploaded"))?;

    let stored = st.uploads.save(&file.name, &file.bytes).await?;
    let response = st.detection.detect(DetectionRequest::upload(file.bytes)).await?;

    Ok(pages::results(&stored, &response))
}
