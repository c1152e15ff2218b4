//! Routes metric events from `tracing` to exporters.
//!
//! Every exported event carries the names of the spans it was emitted in
//! (outermost first) and, when one of those spans recorded a `frame` field,
//! the frame number. The replay driver opens one `frame` span per rendered
//! frame, so cache events can be attributed to the frame that caused them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::event::MetricEvent;

/// Target that metric events are emitted on.
pub const METRICS_TARGET: &str = "metrics";

/// Name of the span field that tags events with a frame number.
pub const FRAME_FIELD: &str = "frame";

/// A decoded metric event and where it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedMetricEvent {
    pub timestamp: DateTime<Utc>,
    /// Nearest enclosing frame number, if any span recorded one.
    pub frame: Option<u64>,
    /// Span names from the outermost span to the innermost.
    pub scope: Vec<&'static str>,
    pub event: MetricEvent,
}

impl EnrichedMetricEvent {
    pub fn innermost_span(&self) -> Option<&'static str> {
        self.scope.last().copied()
    }
}

/// Sink for enriched metric events.
pub trait MetricExporter: Send + Sync {
    fn export(&self, event: &EnrichedMetricEvent);
}

/// Frame number stored in the extensions of spans that recorded one.
#[derive(Clone, Copy, Debug)]
struct FrameTag(u64);

#[derive(Default)]
struct FrameVisitor(Option<u64>);

impl Visit for FrameVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == FRAME_FIELD {
            self.0 = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == FRAME_FIELD {
            self.0 = u64::try_from(value).ok();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

/// Pulls the serialised event out of the `metric` field.
#[derive(Default)]
struct PayloadVisitor(Option<String>);

impl Visit for PayloadVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "metric" {
            self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "metric" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

/// `tracing` layer that decodes events on [`METRICS_TARGET`] and fans them
/// out to every exporter.
pub struct MetricsLayer {
    exporters: Vec<Box<dyn MetricExporter>>,
}

impl MetricsLayer {
    pub fn new(exporters: Vec<Box<dyn MetricExporter>>) -> Self {
        Self { exporters }
    }

    pub fn exporter_count(&self) -> usize {
        self.exporters.len()
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FrameVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(frame), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(FrameTag(frame));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = FrameVisitor::default();
        values.record(&mut visitor);
        if let (Some(frame), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().replace(FrameTag(frame));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target() != METRICS_TARGET || self.exporters.is_empty() {
            return;
        }

        let mut payload = PayloadVisitor::default();
        event.record(&mut payload);
        let Some(json) = payload.0 else {
            return;
        };
        let metric = match serde_json::from_str::<MetricEvent>(&json) {
            Ok(metric) => metric,
            Err(error) => {
                tracing::warn!(target: "kdll_instrumentation", %error, "dropping undecodable metric event");
                return;
            }
        };

        let mut frame = None;
        let mut scope = Vec::new();
        if let Some(spans) = ctx.event_scope(event) {
            // event_scope walks from the innermost span outwards
            for span in spans {
                scope.push(span.name());
                if frame.is_none() {
                    frame = span.extensions().get::<FrameTag>().map(|tag| tag.0);
                }
            }
        }
        scope.reverse();

        let enriched = EnrichedMetricEvent {
            timestamp: Utc::now(),
            frame,
            scope,
            event: metric,
        };
        for exporter in &self.exporters {
            exporter.export(&enriched);
        }
    }
}
