//! Shared fixtures: a scripted detector, in-memory images and a tiny
//! multipart encoder.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Response};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use url::Url;

use detection_api::{
    application::{
        annotate::Annotator,
        ports::{DetectorPort, ImageSourcePort},
        services::DetectionService,
    },
    domain::{
        detection::{BBox, RawDetection},
        errors::DomainResult,
        labels::LabelTable,
        model::DetectOptions,
    },
};

pub const TEST_KEY: &str = "test-secret";
pub const BOUNDARY: &str = "----detection-api-test-boundary";

/// Returns a fixed list of detections and counts how often it ran.
pub struct ScriptedDetector {
    labels: LabelTable,
    output: Vec<RawDetection>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(output: Vec<RawDetection>) -> Arc<Self> {
        Arc::new(Self { labels: LabelTable::coco(), output, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectorPort for ScriptedDetector {
    fn detect(&self, _image: &RgbImage, _options: &DetectOptions) -> DomainResult<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

pub struct FixedSource(pub Vec<u8>);

#[async_trait]
impl ImageSourcePort for FixedSource {
    async fn fetch(&self, _url: &Url) -> DomainResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// One dog, well inside a 640×480 frame.
pub fn one_dog() -> Vec<RawDetection> {
    vec![RawDetection {
        class_index: 16,
        confidence: 0.82,
        bbox: BBox { x1: 120.0, y1: 90.0, x2: 420.0, y2: 400.0 },
    }]
}

pub fn service(detector: Arc<ScriptedDetector>) -> Arc<DetectionService> {
    Arc::new(DetectionService::new(
        detector,
        Arc::new(FixedSource(encode(320, 240, ImageFormat::Png))),
        Arc::new(Annotator::new(None)),
    ))
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode test image");
    buf.into_inner()
}

pub fn jpeg_640x480() -> Vec<u8> {
    encode(640, 480, ImageFormat::Jpeg)
}

pub enum Part<'a> {
    File { name: &'a str, file_name: &'a str, bytes: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

/// Returns `(content-type, body)`.
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { name, file_name, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub async fn body_bytes(res: Response<Body>) -> anyhow::Result<Vec<u8>> {
    Ok(res.into_body().collect().await?.to_bytes().to_vec())
}

pub async fn body_json(res: Response<Body>) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_slice(&body_bytes(res).await?)?)
}

pub async fn body_text(res: Response<Body>) -> anyhow::Result<String> {
    Ok(String::from_utf8(body_bytes(res).await?)?)
}
