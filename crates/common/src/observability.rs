//! Logging and metrics bootstrap shared by the service binaries

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter when a metrics port is configured.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("retrieval_duration_seconds".to_string()),
            crate::metrics::RETRIEVAL_BUCKETS,
        )
        .map_err(|e| AppError::Configuration {
            message: format!("Invalid histogram buckets: {}", e),
        })?
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to install Prometheus exporter: {}", e),
        })?;

    crate::metrics::register_metrics();
    info!(port = config.metrics_port, service = %config.service_name, "Metrics exporter listening");
    Ok(())
}
