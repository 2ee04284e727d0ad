use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info, warn};

use crate::application::ports::DetectorPort;
use crate::domain::{
    detection::{BBox, RawDetection},
    errors::{DomainError, DomainResult},
    labels::LabelTable,
    model::{DetectOptions, DEFAULT_INPUT_SIZE},
};

const INTRA_THREADS: usize = 4;

/// YOLOv8-style detector exported to ONNX (`[1, 4 + nc, N]` output).
pub struct OnnxYoloEngine {
    // `Session::run` wants `&mut self`; requests take turns on the one session.
    session: Mutex<Session>,
    labels: LabelTable,
    input_size: u32,
}

impl OnnxYoloEngine {
    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DomainError::ModelLoad("model path is empty".into()));
        }
        if !path.is_file() {
            return Err(DomainError::ModelLoad(format!("model file not found: {}", path.display())));
        }

        let mut builder = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(INTRA_THREADS))
            .map_err(load_err)?;

        // CUDA is optional: registered when present, otherwise we stay on CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        let model_bytes = fs::read(path).map_err(load_err)?;
        let session = builder.commit_from_memory(&model_bytes).map_err(load_err)?;

        let (labels, input_size) = read_metadata(&session);
        info!(
            path = %path.display(),
            classes = labels.len(),
            input_size,
            "model loaded"
        );

        Ok(Self { session: Mutex::new(session), labels, input_size })
    }

    fn infer(&self, rgb: &RgbImage, options: &DetectOptions) -> DomainResult<Vec<RawDetection>> {
        let imgsz = self.input_size as usize;
        let input = preprocess(rgb, self.input_size);

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let (data, _) = input.into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array((input_shape, data)).map_err(infer_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DomainError::Inference("model session poisoned by an earlier panic".into()))?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(infer_err)?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>().map_err(infer_err)?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 || dims[0] != 1 {
            return Err(DomainError::Inference(format!("unexpected model output shape {dims:?}")));
        }
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out).map_err(infer_err)?;
        let view = array_view
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(infer_err)?;

        let scale = (rgb.width() as f32 / imgsz as f32, rgb.height() as f32 / imgsz as f32);
        let bounds = (rgb.width() as f32, rgb.height() as f32);
        let candidates = decode_predictions(view, scale, bounds, options);
        debug!(candidates = candidates.len(), "decoded model output");

        Ok(non_max_suppression(candidates, options.iou_threshold, options.max_detections))
    }
}

impl DetectorPort for OnnxYoloEngine {
    fn detect(&self, image: &RgbImage, options: &DetectOptions) -> DomainResult<Vec<RawDetection>> {
        self.infer(image, options)
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

fn load_err(e: impl Display) -> DomainError {
    DomainError::ModelLoad(e.to_string())
}

fn infer_err(e: impl Display) -> DomainError {
    DomainError::Inference(e.to_string())
}

/// Ultralytics exports carry `names` and `imgsz` in the custom metadata.
fn read_metadata(session: &Session) -> (LabelTable, u32) {
    let custom = |key: &str| -> Option<String> {
        session.metadata().ok()?.custom(key).ok().flatten()
    };

    let labels = match custom("names") {
        Some(raw) => LabelTable::parse_ultralytics(&raw).unwrap_or_else(|| {
            warn!(names = %raw, "unreadable class names in model metadata, using COCO labels");
            LabelTable::coco()
        }),
        None => {
            warn!("model carries no class names, using COCO labels");
            LabelTable::coco()
        }
    };
    let input_size = custom("imgsz").and_then(|raw| parse_imgsz(&raw)).unwrap_or(DEFAULT_INPUT_SIZE);

    (labels, input_size)
}

/// `"[640, 640]"` or `"640"`; the first positive number wins.
fn parse_imgsz(raw: &str) -> Option<u32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse::<u32>().ok())
        .find(|&n| n > 0)
}

/// Stretches to the square model input and lays it out as normalized NCHW.
fn preprocess(rgb: &RgbImage, size: u32) -> Array4<f32> {
    let imgsz = size as usize;
    let resized = image::imageops::resize(rgb, size, size, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
    for (x, y, pixel) in resized.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Turns the raw `[4 + nc, N]` prediction matrix (rows `cx, cy, w, h`, then one
/// score per class) into boxes in source-image pixels. A `[N, 4 + nc]` matrix
/// is accepted too.
fn decode_predictions(
    preds: ArrayView2<f32>,
    scale: (f32, f32),
    bounds: (f32, f32),
    options: &DetectOptions,
) -> Vec<RawDetection> {
    let preds = if preds.nrows() > preds.ncols() { preds.reversed_axes() } else { preds };
    if preds.nrows() <= 4 {
        return Vec::new();
    }

    let (sx, sy) = scale;
    let (max_x, max_y) = bounds;
    let mut detections = Vec::new();

    for i in 0..preds.ncols() {
        let scores = preds.slice(s![4.., i]);
        let best = scores
            .indexed_iter()
            .filter(|(_, s)| !s.is_nan())
            .max_by(|(_, a), (_, b)| a.total_cmp(b));
        let Some((class_index, &confidence)) = best else { continue };

        if confidence < options.conf_threshold || !options.keeps_class(class_index) {
            continue;
        }

        let cx = preds[[0, i]];
        let cy = preds[[1, i]];
        let w = preds[[2, i]];
        let h = preds[[3, i]];

        detections.push(RawDetection {
            class_index,
            confidence,
            bbox: BBox {
                x1: ((cx - w / 2.0) * sx).clamp(0.0, max_x),
                y1: ((cy - h / 2.0) * sy).clamp(0.0, max_y),
                x2: ((cx + w / 2.0) * sx).clamp(0.0, max_x),
                y2: ((cy + h / 2.0) * sy).clamp(0.0, max_y),
            },
        });
    }

    detections
}

/// Per-class NMS. Output is ordered by descending confidence.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32, max_detections: usize) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for det in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_index == det.class_index && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Builds a `[4 + nc, N]` matrix from `(cx, cy, w, h, class, score)` rows.
    fn predictions(num_classes: usize, boxes: &[(f32, f32, f32, f32, usize, f32)]) -> Array2<f32> {
        let mut m = Array2::<f32>::zeros((4 + num_classes, boxes.len()));
        for (i, &(cx, cy, w, h, class, score)) in boxes.iter().enumerate() {
            m[[0, i]] = cx;
            m[[1, i]] = cy;
            m[[2, i]] = w;
            m[[3, i]] = h;
            m[[4 + class, i]] = score;
        }
        m
    }

    fn opts(conf: f32, iou: f32) -> DetectOptions {
        DetectOptions { conf_threshold: conf, iou_threshold: iou, ..Default::default() }
    }

    #[test]
    fn decodes_and_rescales_boxes() {
        let m = predictions(3, &[(320.0, 320.0, 64.0, 128.0, 2, 0.9)]);
        let dets = decode_predictions(m.view(), (2.0, 0.75), (1280.0, 480.0), &opts(0.5, 0.45));

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_index, 2);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[0].bbox, BBox { x1: 576.0, y1: 192.0, x2: 704.0, y2: 288.0 });
    }

    #[test]
    fn transposed_output_is_accepted() {
        let boxes: Vec<_> = (0..10).map(|i| (50.0 + i as f32, 50.0, 10.0, 10.0, 0, 0.8)).collect();
        let m = predictions(2, &boxes);
        let dets = decode_predictions(m.t(), (1.0, 1.0), (640.0, 640.0), &opts(0.5, 0.45));
        assert_eq!(dets.len(), 10);
    }

    #[test]
    fn low_scores_and_filtered_classes_are_dropped() {
        let m = predictions(3, &[
            (100.0, 100.0, 20.0, 20.0, 0, 0.3),
            (200.0, 200.0, 20.0, 20.0, 1, 0.8),
            (300.0, 300.0, 20.0, 20.0, 2, 0.8),
        ]);
        let mut options = opts(0.5, 0.45);
        options.classes = Some([2].into());

        let dets = decode_predictions(m.view(), (1.0, 1.0), (640.0, 640.0), &options);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_index, 2);
    }

    #[test]
    fn boxes_are_clipped_to_the_image() {
        let m = predictions(1, &[(5.0, 635.0, 40.0, 40.0, 0, 0.9)]);
        let dets = decode_predictions(m.view(), (1.0, 0.75), (640.0, 480.0), &opts(0.5, 0.45));
        let b = dets[0].bbox;
        assert_eq!(b.x1, 0.0);
        assert!(b.y2 <= 480.0);
        assert!(b.x1 <= b.x2 && b.y1 <= b.y2);
    }

    #[test]
    fn nms_suppresses_overlaps_within_a_class_only() {
        let raw = |class_index, confidence, x1: f32| RawDetection {
            class_index,
            confidence,
            bbox: BBox { x1, y1: 0.0, x2: x1 + 100.0, y2: 100.0 },
        };
        let dets = vec![
            raw(0, 0.6, 5.0),   // overlaps the 0.9 person heavily
            raw(0, 0.9, 0.0),
            raw(1, 0.7, 0.0),   // same place, other class
            raw(0, 0.5, 300.0), // far away
        ];

        let kept = non_max_suppression(dets, 0.45, 300);
        let summary: Vec<_> = kept.iter().map(|d| (d.class_index, d.confidence)).collect();
        assert_eq!(summary, [(0, 0.9), (1, 0.7), (0, 0.5)]);
    }

    #[test]
    fn nms_honors_max_detections() {
        let dets: Vec<_> = (0..20)
            .map(|i| RawDetection {
                class_index: 0,
                confidence: 0.5 + i as f32 / 100.0,
                bbox: BBox { x1: i as f32 * 50.0, y1: 0.0, x2: i as f32 * 50.0 + 10.0, y2: 10.0 },
            })
            .collect();
        assert_eq!(non_max_suppression(dets, 0.45, 5).len(), 5);
    }

    #[test]
    fn preprocess_normalizes_into_nchw() {
        let img = RgbImage::from_pixel(10, 20, image::Rgb([255, 0, 51]));
        let input = preprocess(&img, 32);
        assert_eq!(input.shape(), &[1, 3, 32, 32]);
        assert!((input[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert_eq!(input[[0, 1, 5, 5]], 0.0);
        assert!((input[[0, 2, 5, 5]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn imgsz_metadata_forms() {
        assert_eq!(parse_imgsz("[640, 640]"), Some(640));
        assert_eq!(parse_imgsz("320"), Some(320));
        assert_eq!(parse_imgsz("[]"), None);
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let err = OnnxYoloEngine::load("does/not/exist.onnx").err().expect("load must fail");
        assert!(matches!(err, DomainError::ModelLoad(ref msg) if msg.contains("not found")));
    }

    #[test]
    fn garbage_model_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        fs::write(&path, b"definitely not protobuf").unwrap();

        let err = OnnxYoloEngine::load(&path).err().expect("load must fail");
        assert!(matches!(err, DomainError::ModelLoad(_)));
    }
}
