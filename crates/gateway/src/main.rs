use gateway::{AppState, config::get_configuration, logging::setup_logging, run_server};
use inference::{InferenceConfig, ModelDetector, ResultStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;
    let _telemetry = setup_logging(&config)?;

    tracing::info!(config = ?config, "Loaded configuration");

    let inference_config = InferenceConfig::from_env()?;
    tracing::info!(config = ?inference_config, "Loading inference model");
    let detector = ModelDetector::load(&inference_config)?;
    tracing::info!("Model loaded successfully");

    let store = ResultStore::new(&config.static_dir);
    store.ensure()?;

    let state = AppState::new(
        Box::new(detector),
        store,
        config.scratch_root(),
        config.max_upload_bytes,
    );

    run_server(&config, state).await
}
