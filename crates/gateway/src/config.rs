use common::Environment;
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: i64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Served under `/static`; holds the latest annotated result.
    pub static_dir: PathBuf,
    /// Parent of the per-request upload directories. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Defaults, overridden by `GATEWAY_*` environment variables
/// (`GATEWAY_PORT=8080`, `GATEWAY_STATIC_DIR=/srv/static`, ...).
///
/// The environment falls back to the shared `ENVIRONMENT` variable.
pub fn get_configuration() -> Result<GatewayConfig, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("environment", Environment::from_env().as_str())?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 5000_i64)?
        .set_default("static_dir", "static")?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: GatewayConfig = config.try_deserialize::<GatewayConfig>()?;

    if config.max_upload_bytes == 0 {
        return Err(config::ConfigError::Message(
            "max_upload_bytes must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}
