//! Object detection over uploaded images: a YOLOv8 ONNX model behind a JSON
//! API (shared-secret protected) and an HTML upload form.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
