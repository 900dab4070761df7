use crate::config::{CommonConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "cronprobe";

#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("invalid sentry DSN: {0}")]
    InvalidDsn(String),
    #[error("could not create statsd exporter: {0}")]
    Statsd(String),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
}

/// Installs logging, and optionally Sentry and StatsD metrics.
///
/// Logs go to stderr so that stdout stays reserved for command output. The
/// returned guard flushes Sentry events when dropped and must be kept alive
/// for the lifetime of the process.
pub fn init(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, ObservabilityError> {
    let sentry_guard = match &common.logging {
        Some(logging) => {
            let dsn = logging
                .sentry_dsn
                .parse::<sentry::types::Dsn>()
                .map_err(|e| ObservabilityError::InvalidDsn(e.to_string()))?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            sentry_guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .init();

    if let Some(metrics_config) = &common.metrics {
        init_metrics(metrics_config)?;
        tracing::info!(
            host = %metrics_config.statsd_host,
            port = metrics_config.statsd_port,
            "StatsD metrics enabled"
        );
    }

    Ok(sentry_guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), ObservabilityError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| ObservabilityError::Statsd(e.to_string()))?;

    metrics::set_global_recorder(recorder)
        .map_err(|e| ObservabilityError::Recorder(e.to_string()))?;
    shared::metrics_defs::describe_metrics(dispatcher::metrics_defs::ALL_METRICS);

    Ok(())
}
