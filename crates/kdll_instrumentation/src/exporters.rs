//! Metric sinks: a JSON-lines file, stdout, and an in-process channel.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use crate::recorder::{EnrichedMetricEvent, MetricExporter};

/// Appends one JSON object per event to a file.
///
/// Lines are buffered and flushed every `flush_every` events and on drop.
pub struct JsonlExporter {
    state: Mutex<JsonlState>,
    flush_every: usize,
}

struct JsonlState {
    writer: BufWriter<File>,
    pending: usize,
}

impl JsonlExporter {
    pub const DEFAULT_FLUSH_EVERY: usize = 64;

    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::with_flush_every(path, Self::DEFAULT_FLUSH_EVERY)
    }

    pub fn with_flush_every<P: AsRef<Path>>(path: P, flush_every: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            state: Mutex::new(JsonlState {
                writer: BufWriter::new(file),
                pending: 0,
            }),
            flush_every: flush_every.max(1),
        })
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.pending = 0;
        state.writer.flush()
    }
}

impl MetricExporter for JsonlExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!(target: "kdll_instrumentation", %error, "metric event not serialisable");
                return;
            }
        };
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut result = writeln!(state.writer, "{line}");
        state.pending += 1;
        if result.is_ok() && state.pending >= self.flush_every {
            state.pending = 0;
            result = state.writer.flush();
        }
        if let Err(error) = result {
            tracing::warn!(target: "kdll_instrumentation", %error, "failed to append metric to jsonl file");
        }
    }
}

impl Drop for JsonlExporter {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = state.writer.flush();
    }
}

/// Prints one line per event to stdout, e.g. `metric frame=12 insert: kcid=0x10004 ...`.
#[derive(Debug, Default)]
pub struct ConsoleExporter;

impl ConsoleExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(event: &EnrichedMetricEvent) -> String {
        match event.frame {
            Some(frame) => format!("metric frame={frame} {}: {}", event.event.kind(), event.event),
            None => format!("metric {}: {}", event.event.kind(), event.event),
        }
    }
}

impl MetricExporter for ConsoleExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        println!("{}", Self::render(event));
    }
}

/// Forwards events to an in-process receiver; dropped silently once it hangs up.
pub struct ChannelExporter {
    sender: Sender<EnrichedMetricEvent>,
}

impl ChannelExporter {
    pub fn new(sender: Sender<EnrichedMetricEvent>) -> Self {
        Self { sender }
    }
}

impl MetricExporter for ChannelExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        let _ = self.sender.send(event.clone());
    }
}
