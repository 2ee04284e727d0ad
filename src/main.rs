use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use detection_api::{
    adapters::{
        fetch::http_source::HttpImageSource,
        http::{api_router, state::{ApiState, WebState}, web_router, ApiOptions},
        onnx::yolo_engine::OnnxYoloEngine,
        storage::upload_dir::UploadDir,
    },
    application::{annotate::Annotator, services::DetectionService},
    config::{Cli, Command, ServeArgs, APP_NAME, VERSION},
    domain::request::DetectionParams,
};

/// Fetched URL images are capped like uploads in the one-shot command.
const DETECT_FETCH_LIMIT: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Logging (RUST_LOG wins over --log-level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with_target(true)
        .init();

    tracing::info!("{APP_NAME} v{VERSION}");

    // 2. Model: loaded once, shared by every request. Failure stops startup.
    let engine = OnnxYoloEngine::load(&cli.model_path)
        .with_context(|| format!("cannot start without a model ({})", cli.model_path.display()))?;

    // 3. Use case
    let max_fetch = match &cli.command {
        Command::Api(args) => args.serve.max_upload_bytes(),
        Command::Web(args) => args.serve.max_upload_bytes(),
        Command::Detect(_) => DETECT_FETCH_LIMIT,
    };
    let detection = Arc::new(DetectionService::new(
        Arc::new(engine),
        Arc::new(HttpImageSource::new(max_fetch)),
        Arc::new(Annotator::from_font_path(cli.font_path.as_deref())),
    ));

    // 4. Front end
    match cli.command {
        Command::Api(args) => {
            let state = ApiState { detection, api_key: args.secret_key.into() };
            let app = api_router(
                state,
                ApiOptions { public_health: args.public_health, max_upload_bytes: args.serve.max_upload_bytes() },
            );
            serve(app, &args.serve).await
        }
        Command::Web(args) => {
            let uploads = UploadDir::new(args.static_dir.join("uploads"), "/static/uploads");
            let state = WebState { detection, uploads: Arc::new(uploads) };
            tracing::info!("📂 Static files served from {}", args.static_dir.display());
            let app = web_router(state, args.static_dir, args.serve.max_upload_bytes());
            serve(app, &args.serve).await
        }
        Command::Detect(args) => {
            let bytes = tokio::fs::read(&args.image)
                .await
                .with_context(|| format!("cannot read {}", args.image.display()))?;
            let params = DetectionParams {
                confidence_threshold: args.confidence,
                iou_threshold: args.iou,
                return_image: args.return_image,
                classes: args.classes,
                ..Default::default()
            };
            let request = params.validate(Some(bytes))?;
            let response = detection.detect(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

async fn serve(app: axum::Router, args: &ServeArgs) -> anyhow::Result<()> {
    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    tracing::info!("🚀 Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
