use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::prelude::*;

fn insert_event(frame: Option<u64>) -> EnrichedMetricEvent {
    EnrichedMetricEvent {
        timestamp: Utc::now(),
        frame,
        scope: vec!["frame", "kdll_add_kernel"],
        event: MetricEvent::KernelCacheInsert {
            kcid: 0x0001_0000,
            kernel_bytes: 4096,
            slot_bytes: 4820,
        },
    }
}

fn temp_path(tag: &str) -> std::path::PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("kdll_metrics_{tag}_{unique}.jsonl"))
}

#[test]
fn jsonl_exporter_flushes_on_drop() {
    let path = temp_path("drop");
    let events = [insert_event(Some(1)), insert_event(Some(2))];
    {
        let exporter = JsonlExporter::new(&path).expect("open jsonl file");
        for event in &events {
            exporter.export(event);
        }
    }

    let contents = std::fs::read_to_string(&path).expect("file written");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
    assert_eq!(first["frame"], 1);
    assert_eq!(first["scope"][1], "kdll_add_kernel");
    assert_eq!(first["event"]["type"], "KernelCacheInsert");
    std::fs::remove_file(&path).expect("remove temp file");
}

#[test]
fn jsonl_exporter_flushes_in_batches() {
    let path = temp_path("batch");
    let exporter = JsonlExporter::with_flush_every(&path, 2).expect("open jsonl file");
    exporter.export(&insert_event(None));
    exporter.export(&insert_event(None));
    assert_eq!(std::fs::read_to_string(&path).expect("file exists").lines().count(), 2);

    exporter.export(&insert_event(None));
    exporter.flush().expect("flush");
    assert_eq!(std::fs::read_to_string(&path).expect("file exists").lines().count(), 3);
    drop(exporter);
    std::fs::remove_file(&path).expect("remove temp file");
}

#[test]
fn console_lines_name_the_frame_and_kind() {
    assert_eq!(
        ConsoleExporter::render(&insert_event(Some(12))),
        "metric frame=12 insert: kcid=0x10000 kernel=4096B slot=4820B"
    );
    assert_eq!(
        ConsoleExporter::render(&insert_event(None)),
        "metric insert: kcid=0x10000 kernel=4096B slot=4820B"
    );
}

#[test]
fn channel_exporter_forwards_events() {
    let (sender, receiver) = mpsc::channel();
    let exporter = ChannelExporter::new(sender);
    let event = insert_event(Some(3));
    exporter.export(&event);
    assert_eq!(receiver.try_recv().expect("forwarded"), event);

    drop(receiver);
    exporter.export(&event);
}

#[test]
fn metric_events_round_trip_through_json() {
    let event = MetricEvent::KernelCacheEviction {
        kcid: 0x0001_0003,
        refresh: 7,
        live_after: 63,
    };
    let json = serde_json::to_string(&event).expect("serialise");
    assert!(json.contains("\"type\":\"KernelCacheEviction\""));
    let back: MetricEvent = serde_json::from_str(&json).expect("deserialise");
    assert_eq!(back, event);
    assert_eq!(back.kind(), "eviction");
    assert_eq!(back.to_string(), "kcid=0x10003 refresh=7 live=63");
}
