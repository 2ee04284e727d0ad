use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use crate::{
    application::{
        annotate::Annotator,
        ports::{DetectorPort, ImageSourcePort},
    },
    domain::{
        detection::{DetectionResponse, DetectionResult, ImageSize},
        errors::{DomainError, DomainResult},
        model::DetectOptions,
        request::{DetectionRequest, ImageInput},
    },
};

/// Runs one detection request end to end: obtain bytes, decode, infer, label,
/// optionally annotate.
///
/// Holds the single model handle for the process; cloning the service only
/// clones the `Arc`s.
#[derive(Clone)]
pub struct DetectionService {
    detector: Arc<dyn DetectorPort>,
    source: Arc<dyn ImageSourcePort>,
    annotator: Arc<Annotator>,
}

impl DetectionService {
    pub fn new(detector: Arc<dyn DetectorPort>, source: Arc<dyn ImageSourcePort>, annotator: Arc<Annotator>) -> Self {
        Self { detector, source, annotator }
    }

    /// Inference is blocking, so it is moved to the blocking pool.
    pub async fn detect(&self, request: DetectionRequest) -> DomainResult<DetectionResponse> {
        let options = DetectOptions::from(&request);
        let return_image = request.return_image;

        let bytes = match request.image {
            ImageInput::Upload(bytes) => bytes,
            ImageInput::Url(url) => self.source.fetch(&url).await?,
        };

        let detector = self.detector.clone();
        let annotator = self.annotator.clone();
        tokio::task::spawn_blocking(move || {
            run_detection(detector.as_ref(), annotator.as_ref(), &bytes, &options, return_image)
        })
        .await
        .map_err(|e| DomainError::Inference(format!("inference task failed: {e}")))?
    }

    /// Default thresholds, no annotation. Backs the plain `/predict` routes.
    pub async fn predict(&self, bytes: Vec<u8>) -> DomainResult<Vec<DetectionResult>> {
        Ok(self.detect(DetectionRequest::upload(bytes)).await?.detections)
    }
}

fn run_detection(
    detector: &dyn DetectorPort,
    annotator: &Annotator,
    bytes: &[u8],
    options: &DetectOptions,
    return_image: bool,
) -> DomainResult<DetectionResponse> {
    let rgb = decode_image(bytes)?;

    let started = Instant::now();
    let raw = detector.detect(&rgb, options)?;
    let processing_time = started.elapsed().as_secs_f64();

    let labels = detector.labels();
    let detections = raw
        .into_iter()
        .map(|d| {
            let class_name = labels.resolve(d.class_index)?.to_string();
            let class_id = u32::try_from(d.class_index).map_err(|_| DomainError::LabelResolution(d.class_index))?;
            Ok(DetectionResult { class_id, class_name, confidence: d.confidence, bbox: d.bbox })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    info!(
        width = rgb.width(),
        height = rgb.height(),
        infer_ms = processing_time * 1000.0,
        found = %summarize_detections(&detections),
        "detection finished"
    );

    let annotated_image = if return_image {
        Some(annotator.annotate(&rgb, &detections)?)
    } else {
        None
    };

    Ok(DetectionResponse {
        success: true,
        detections,
        processing_time,
        image_size: Some(ImageSize { width: rgb.width(), height: rgb.height() }),
        annotated_image,
    })
}

fn decode_image(bytes: &[u8]) -> DomainResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| DomainError::Inference(format!("cannot decode image: {e}")))?;
    debug!(width = img.width(), height = img.height(), "image decoded");
    Ok(img.to_rgb8())
}

/// `"2 person, 1 dog"`, sorted by label.
pub fn summarize_detections(detections: &[DetectionResult]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for det in detections {
        *counts.entry(det.class_name.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_unstable();
    counts
        .iter()
        .map(|(label, count)| format!("{count} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
}
