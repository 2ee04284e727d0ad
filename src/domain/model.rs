use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::request::DetectionRequest;

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Filtering knobs handed to the model gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectOptions {
    pub conf_threshold: f32,    // 0.1..=0.99
    pub iou_threshold: f32,     // 0.1..=0.99
    pub classes: Option<BTreeSet<usize>>,
    pub max_detections: usize,
}

impl DetectOptions {
    pub fn keeps_class(&self, class_index: usize) -> bool {
        self.classes.as_ref().map_or(true, |set| set.contains(&class_index))
    }
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            conf_threshold: super::request::DEFAULT_CONFIDENCE,
            iou_threshold: super::request::DEFAULT_IOU,
            classes: None,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

impl From<&DetectionRequest> for DetectOptions {
    fn from(r: &DetectionRequest) -> Self {
        Self {
            conf_threshold: r.confidence_threshold,
            iou_threshold: r.iou_threshold,
            classes: r.classes.as_ref().map(|set| set.iter().map(|&c| c as usize).collect()),
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}
