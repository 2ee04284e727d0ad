use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const APP_NAME: &str = "Object Detection API";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every setting can come from a flag or from the environment; flags win.
#[derive(Debug, Parser)]
#[command(name = "detection-api", version, about = "Object detection over uploaded images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the YOLOv8 ONNX model.
    #[arg(long, env = "MODEL_PATH", default_value = "model/best.onnx", global = true)]
    pub model_path: PathBuf,

    /// TrueType font for labels on annotated images. Boxes only when unset.
    #[arg(long, env = "FONT_PATH", global = true)]
    pub font_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the JSON API (X-API-Key protected).
    Api(ApiArgs),
    /// Serve the HTML upload form.
    Web(WebArgs),
    /// Run detection on one image file and print the JSON response.
    Detect(DetectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 16)]
    pub max_upload_mb: usize,
}

impl ServeArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    #[command(flatten)]
    pub serve: ServeArgs,

    /// Shared secret expected in the X-API-Key header.
    #[arg(long, env = "SECRET_KEY_TOKEN", default_value = "default-secret-key", hide_env_values = true)]
    pub secret_key: String,

    /// Leave `/` and `/health` open.
    #[arg(long, env = "PUBLIC_HEALTH")]
    pub public_health: bool,
}

#[derive(Debug, Args)]
pub struct WebArgs {
    #[command(flatten)]
    pub serve: ServeArgs,

    /// Directory served under `/static`; uploads go to its `uploads/` folder.
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Image file to run detection on.
    pub image: PathBuf,

    #[arg(long, default_value_t = 0.5)]
    pub confidence: f64,

    #[arg(long, default_value_t = 0.45)]
    pub iou: f64,

    /// Comma-separated class ids to keep, e.g. `0,16`.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub classes: Option<Vec<i64>>,

    /// Include the annotated image as a data URI.
    #[arg(long)]
    pub return_image: bool,
}
