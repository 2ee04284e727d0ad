pub mod auth;
pub mod error;
pub mod pages;
pub mod routes;
pub mod state;
pub mod upload;
pub mod web;

use std::path::PathBuf;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::adapters::http::state::{ApiState, WebState};

pub struct ApiOptions {
    /// Serve `/` and `/health` without checking `X-API-Key`.
    pub public_health: bool,
    pub max_upload_bytes: usize,
}

/// JSON API: every route requires the key, except the health routes when
/// `public_health` is set.
pub fn api_router(state: ApiState, options: ApiOptions) -> Router {
    let health = Router::new()
        .route("/", get(routes::home))
        .route("/health", get(routes::health));
    let mut guarded = Router::new()
        .route("/predict", post(routes::predict))
        .route("/detect", post(routes::detect));

    let open = if options.public_health {
        health
    } else {
        guarded = guarded.merge(health);
        Router::new()
    };
    let guarded = guarded.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    open.merge(guarded)
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTML front end. Uploads live under `<static_dir>/uploads` and are served
/// back from `/static`.
pub fn web_router(state: WebState, static_dir: PathBuf, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(web::index))
        .route("/predict", post(web::predict))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
