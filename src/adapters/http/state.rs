use std::sync::Arc;

use crate::application::{ports::UploadStorePort, services::DetectionService};

/// Shared state of the JSON API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Detection use case; owns the process-wide model handle.
    pub detection: Arc<DetectionService>,
    /// Expected value of the `X-API-Key` header.
    pub api_key: Arc<str>,
}

/// Shared state of the HTML form handlers.
#[derive(Clone)]
pub struct WebState {
    pub detection: Arc<DetectionService>,
    pub uploads: Arc<dyn UploadStorePort>,
}
