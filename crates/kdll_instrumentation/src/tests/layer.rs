use std::sync::mpsc;

use crate::prelude::*;

fn channel_subscriber() -> (impl tracing::Subscriber + Send + Sync, mpsc::Receiver<EnrichedMetricEvent>) {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    (tracing_subscriber::registry().with(MetricsLayer::new(exporters)), receiver)
}

#[test]
fn events_carry_scope_and_frame() {
    let (subscriber, receiver) = channel_subscriber();
    let metric = MetricEvent::KernelCacheEviction {
        kcid: 0x1_0004,
        refresh: 9,
        live_after: 15,
    };

    subscriber::with_default(subscriber, || {
        let frame = info_span!("frame", frame = 17u64);
        let _frame = frame.enter();
        let gc = info_span!("kdll_gc");
        let _gc = gc.enter();
        record_metric!(metric.clone());
    });

    let enriched = receiver.try_recv().expect("metric dispatched");
    assert_eq!(enriched.frame, Some(17));
    assert_eq!(enriched.scope, vec!["frame", "kdll_gc"]);
    assert_eq!(enriched.innermost_span(), Some("kdll_gc"));
    assert_eq!(enriched.event, metric);
}

#[test]
fn frame_can_be_recorded_after_the_span_opens() {
    let (subscriber, receiver) = channel_subscriber();

    subscriber::with_default(subscriber, || {
        let frame = info_span!("frame", frame = tracing::field::Empty);
        frame.record("frame", 4u64);
        let _frame = frame.enter();
        record_metric!(MetricEvent::KernelCacheGrowth { capacity: 8, max: 64 });
    });

    assert_eq!(receiver.try_recv().expect("metric dispatched").frame, Some(4));
}

#[test]
fn events_outside_spans_have_no_context() {
    let (subscriber, receiver) = channel_subscriber();

    subscriber::with_default(subscriber, || {
        record_metric!(MetricEvent::KernelCacheRejected {
            reason: "built kernel is empty".into()
        });
    });

    let enriched = receiver.try_recv().expect("metric dispatched");
    assert_eq!(enriched.frame, None);
    assert!(enriched.scope.is_empty());
}

#[test]
fn non_metric_and_malformed_events_are_ignored() {
    let (subscriber, receiver) = channel_subscriber();

    subscriber::with_default(subscriber, || {
        tracing::info!(target: "kdll", metric = "not json", "ordinary log line");
        tracing::info!(target: "metrics", metric = "{not valid}", "malformed metric");
    });

    assert!(receiver.try_recv().is_err());
}
