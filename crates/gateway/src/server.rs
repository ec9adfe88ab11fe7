use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::upload::{ScratchUpload, sanitize_file_name};
use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub const IMAGE_FIELD: &str = "image";
pub const STATIC_PREFIX: &str = "static";

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub result: String,
}

impl DetectResponse {
    pub fn for_result(file_name: &str) -> Self {
        Self {
            result: format!("{}/{}", STATIC_PREFIX, file_name),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/detect", post(detect_handler))
        .route("/health", get(health_handler))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn detect_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let (file_name, bytes) = read_image_field(&mut multipart).await?;

    tracing::info!(file_name = %file_name, bytes = bytes.len(), "Detect request received");

    let result =
        tokio::task::spawn_blocking(move || run_detection(&state, &file_name, &bytes)).await??;

    match result {
        Some(name) => Ok(Json(DetectResponse::for_result(&name))),
        None => Err(ApiError::NoOutput),
    }
}

async fn read_image_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let raw_name = field
            .file_name()
            .ok_or_else(|| ApiError::InvalidUpload("the image field has no file name".into()))?;
        let file_name = sanitize_file_name(raw_name)
            .ok_or_else(|| ApiError::InvalidUpload(format!("unusable file name {:?}", raw_name)))?
            .to_string();

        let bytes = field.bytes().await?;
        return Ok((file_name, bytes));
    }

    Err(ApiError::MissingField(IMAGE_FIELD))
}

/// Clear, persist, detect, clean up; all under the adapter lock.
fn run_detection(
    state: &AppState,
    file_name: &str,
    bytes: &[u8],
) -> Result<Option<String>, ApiError> {
    let mut adapter = state.adapter.blocking_lock();

    adapter
        .store()
        .clear()
        .context("Failed to clear output directory")?;

    let upload = ScratchUpload::persist(&state.scratch_root, file_name, bytes)
        .context("Failed to persist upload")?;

    let result = adapter.detect(upload.path());

    if let Err(e) = upload.remove() {
        tracing::warn!(error = %e, "Failed to remove scratch upload");
    }

    Ok(result?)
}
