use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LoggingConfig, MetricsConfig};

const LOG_FILE_PREFIX: &str = "seller-repricer.log";

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Starts the Prometheus scrape endpoint when metrics are enabled.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
