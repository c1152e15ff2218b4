//! Developer-facing macros for emitting structured metric events.

/// Emit a [`MetricEvent`](crate::MetricEvent) as a `tracing` event on the `metrics` target.
///
/// Serialisation only happens when a subscriber is interested in the event.
#[macro_export]
macro_rules! record_metric {
    ($event:expr) => {{
        if ::tracing::enabled!(target: "metrics", ::tracing::Level::INFO) {
            if let Ok(__metric_json) = $crate::serde_json::to_string(&$event) {
                ::tracing::event!(
                    target: "metrics",
                    ::tracing::Level::INFO,
                    metric = %__metric_json
                );
            }
        }
    }};
}
