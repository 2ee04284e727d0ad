use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::{DomainError, DomainResult, ValidationErrors};

pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_IOU: f32 = 0.45;
pub const THRESHOLD_RANGE: RangeInclusive<f64> = 0.1..=0.99;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    #[default]
    Yolov8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSourceType {
    #[default]
    Upload,
    Url,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Upload(Vec<u8>),
    Url(Url),
}

/// A request that already passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub image: ImageInput,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub method: DetectionMethod,
    pub return_image: bool,
    pub classes: Option<BTreeSet<u32>>,
}

impl DetectionRequest {
    /// Default thresholds over raw uploaded bytes.
    pub fn upload(bytes: Vec<u8>) -> Self {
        Self {
            image: ImageInput::Upload(bytes),
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            method: DetectionMethod::default(),
            return_image: false,
            classes: None,
        }
    }
}

/// Detection parameters as they arrive over the wire, before validation.
///
/// Numbers are kept wide on purpose here (`f64`, `i64`) so out-of-domain
/// values reach [`DetectionParams::validate`] instead of failing inside the
/// deserializer with a less useful message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    #[serde(default)]
    pub source_type: ImageSourceType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f64,
    #[serde(default = "default_iou")]
    pub iou_threshold: f64,
    #[serde(default)]
    pub method: DetectionMethod,
    #[serde(default)]
    pub return_image: bool,
    #[serde(default)]
    pub classes: Option<Vec<i64>>,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE as f64
}

fn default_iou() -> f64 {
    DEFAULT_IOU as f64
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            source_type: ImageSourceType::Upload,
            image_url: None,
            confidence_threshold: default_confidence(),
            iou_threshold: default_iou(),
            method: DetectionMethod::Yolov8,
            return_image: false,
            classes: None,
        }
    }
}

impl DetectionParams {
    /// Checks every field and builds a [`DetectionRequest`]. All violations are
    /// reported together, each naming its field.
    pub fn validate(self, upload: Option<Vec<u8>>) -> DomainResult<DetectionRequest> {
        let mut errors = ValidationErrors::default();

        let confidence = check_threshold(&mut errors, "confidence_threshold", self.confidence_threshold);
        let iou = check_threshold(&mut errors, "iou_threshold", self.iou_threshold);

        let classes = match self.classes {
            None => None,
            Some(list) => {
                let mut set = BTreeSet::new();
                for id in list {
                    match u32::try_from(id) {
                        Ok(id) => {
                            set.insert(id);
                        }
                        Err(_) => errors.push("classes", format!("class id {id} must be a non-negative integer")),
                    }
                }
                Some(set)
            }
        };

        let image = match self.source_type {
            ImageSourceType::Upload => match upload {
                Some(bytes) => Some(ImageInput::Upload(bytes)),
                None => {
                    errors.push("file", "an image upload is required when source_type is 'upload'");
                    None
                }
            },
            ImageSourceType::Url => match self.image_url.as_deref().map(parse_image_url) {
                Some(Ok(url)) => Some(ImageInput::Url(url)),
                Some(Err(msg)) => {
                    errors.push("image_url", msg);
                    None
                }
                None => {
                    errors.push("image_url", "required when source_type is 'url'");
                    None
                }
            },
        };

        match image {
            Some(image) if errors.is_empty() => Ok(DetectionRequest {
                image,
                confidence_threshold: confidence,
                iou_threshold: iou,
                method: self.method,
                return_image: self.return_image,
                classes,
            }),
            _ => Err(DomainError::Validation(errors)),
        }
    }
}

fn check_threshold(errors: &mut ValidationErrors, field: &str, value: f64) -> f32 {
    // Checked at full width: narrowing first would round near-misses onto the bounds.
    if !THRESHOLD_RANGE.contains(&value) {
        errors.push(
            field,
            format!(
                "{value} is outside [{}, {}]",
                THRESHOLD_RANGE.start(),
                THRESHOLD_RANGE.end()
            ),
        );
    }
    value as f32
}

fn parse_image_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("not a valid absolute URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL has no host".into());
    }
    Ok(url)
}
