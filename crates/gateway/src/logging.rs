use crate::config::GatewayConfig;
use common::TelemetryGuard;

const SERVICE_NAME: &str = "gateway";

/// Install the global subscriber, exporting over OTLP when an endpoint is configured.
///
/// The returned guard must stay alive for the lifetime of the process.
pub fn setup_logging(config: &GatewayConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    match config.otel_endpoint.as_deref() {
        Some(endpoint) => {
            let guard = TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment)?;
            Ok(Some(guard))
        }
        None => {
            common::setup_logging(config.environment);
            Ok(None)
        }
    }
}
