use serde::{Deserialize, Serialize};

use crate::domain::detection::{BBox, DetectionResult};

/// One entry of the `/predict` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub confidence: f32,
    pub bbox: BBox,
}

impl From<DetectionResult> for Prediction {
    fn from(d: DetectionResult) -> Self {
        Self { class: d.class_name, confidence: d.confidence, bbox: d.bbox }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionsResponse {
    pub predictions: Vec<Prediction>,
}

impl From<Vec<DetectionResult>> for PredictionsResponse {
    fn from(detections: Vec<DetectionResult>) -> Self {
        Self { predictions: detections.into_iter().map(Prediction::from).collect() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
