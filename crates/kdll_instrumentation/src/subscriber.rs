//! Global `tracing` subscriber assembly.

use tracing::Subscriber;
use tracing_subscriber::{
    Layer, filter::filter_fn, fmt, layer::SubscriberExt, registry::LookupSpan, util::{SubscriberInitExt, TryInitError}
};

use crate::{
    AppConfig, MetricExporter, MetricsLayer, exporters::{ConsoleExporter, JsonlExporter}, recorder::METRICS_TARGET
};

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("failed to open metrics file: {0}")]
    Exporter(#[from] std::io::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Exporters requested by the configuration.
pub fn exporters_for(config: &AppConfig) -> Result<Vec<Box<dyn MetricExporter>>, SubscriberError> {
    let mut exporters: Vec<Box<dyn MetricExporter>> = Vec::new();
    if let Some(path) = &config.metrics_jsonl_path {
        exporters.push(Box::new(JsonlExporter::new(path)?));
    }
    if config.enable_console_metrics {
        exporters.push(Box::new(ConsoleExporter::new()));
    }
    Ok(exporters)
}

/// Human readable log layer honouring `config.log_level`; metric events are left to [`MetricsLayer`].
pub fn log_layer<S>(config: &AppConfig) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let level = config.log_level;
    fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(move |meta| meta.target() != METRICS_TARGET && *meta.level() <= level))
}

/// Install the process-wide subscriber: log output plus metric routing.
pub fn init_subscriber(config: &AppConfig) -> Result<(), SubscriberError> {
    let registry = tracing_subscriber::registry().with(log_layer(config));
    if config.exports_metrics() {
        registry.with(MetricsLayer::new(exporters_for(config)?)).try_init()?;
    } else {
        registry.try_init()?;
    }
    Ok(())
}
