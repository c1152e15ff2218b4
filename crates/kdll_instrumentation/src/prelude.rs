//! Convenience re-exports for instrumentation consumers.

pub use crate::config::{AppConfig, AppConfigError};
pub use crate::event::MetricEvent;
pub use crate::exporters::{ChannelExporter, ConsoleExporter, JsonlExporter};
pub use crate::record_metric;
pub use crate::recorder::{EnrichedMetricEvent, MetricExporter, MetricsLayer};
pub use crate::subscriber::{SubscriberError, init_subscriber};

pub use kdll_env::{EnvVar, EnvVarError, EnvVarGuard, Environment, InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};

pub use chrono::{DateTime, Utc};
pub use tracing::{Level, info_span, subscriber};
pub use tracing_subscriber::layer::SubscriberExt;
