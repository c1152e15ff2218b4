//! Logging configuration and structured metrics for the kernel cache.
//!
//! Metrics are ordinary `tracing` events on the `metrics` target carrying a
//! serialised [`MetricEvent`]. [`MetricsLayer`] picks them up, attaches span
//! context and hands them to the configured [`MetricExporter`]s.

pub mod config;
pub mod event;
pub mod exporters;
pub mod macros;
pub mod prelude;
pub mod recorder;
pub mod subscriber;

pub use config::{AppConfig, AppConfigError};
pub use event::MetricEvent;
pub use recorder::{EnrichedMetricEvent, MetricExporter, MetricsLayer};
pub use serde_json;

#[cfg(test)]
mod tests;
