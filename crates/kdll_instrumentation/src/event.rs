//! Canonical metric event definitions.

use serde::{Deserialize, Serialize};

/// Structured metric events emitted by the combined-kernel cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MetricEvent {
    /// A newly built kernel was stored.
    KernelCacheInsert { kcid: i32, kernel_bytes: u64, slot_bytes: u64 },
    /// Garbage collection released the least recently used entry.
    KernelCacheEviction { kcid: i32, refresh: u32, live_after: u64 },
    /// The slot table grew by one batch.
    KernelCacheGrowth { capacity: u64, max: u64 },
    /// Recency counters were rebased to stay clear of overflow.
    KernelCacheRebase { offset: u32, counter_after: u32 },
    /// An insert was refused.
    KernelCacheRejected { reason: String },
}

impl MetricEvent {
    /// Short stable name, handy for console summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricEvent::KernelCacheInsert { .. } => "insert",
            MetricEvent::KernelCacheEviction { .. } => "eviction",
            MetricEvent::KernelCacheGrowth { .. } => "growth",
            MetricEvent::KernelCacheRebase { .. } => "rebase",
            MetricEvent::KernelCacheRejected { .. } => "rejected",
        }
    }
}

impl std::fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricEvent::KernelCacheInsert {
                kcid,
                kernel_bytes,
                slot_bytes,
            } => write!(f, "kcid={kcid:#x} kernel={kernel_bytes}B slot={slot_bytes}B"),
            MetricEvent::KernelCacheEviction { kcid, refresh, live_after } => {
                write!(f, "kcid={kcid:#x} refresh={refresh} live={live_after}")
            }
            MetricEvent::KernelCacheGrowth { capacity, max } => write!(f, "capacity={capacity}/{max}"),
            MetricEvent::KernelCacheRebase { offset, counter_after } => {
                write!(f, "offset={offset:#x} counter={counter_after:#x}")
            }
            MetricEvent::KernelCacheRejected { reason } => f.write_str(reason),
        }
    }
}
