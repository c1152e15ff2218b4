use std::fmt;

use serde::Serialize;

/// Summary of the most recent cache interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub detail: String,
}

impl CacheEvent {
    #[inline]
    pub fn new(kind: CacheEventKind, detail: String) -> Self {
        Self { kind, detail }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.kind, self.detail)
    }
}

/// The type of cache event that most recently occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheEventKind {
    Insert,
    Evicted,
    Rejected,
    Rebased,
    Cleared,
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Evicted => f.write_str("evicted"),
            Self::Rejected => f.write_str("rejected"),
            Self::Rebased => f.write_str("rebased"),
            Self::Cleared => f.write_str("cleared"),
        }
    }
}

/// Running counters kept by the kernel cache.
#[derive(Clone, Debug, Default)]
pub struct CacheCounters {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) inserts: u64,
    pub(crate) evictions: u64,
    pub(crate) rejects: u64,
    pub(crate) rebases: u64,
    pub(crate) last_event: Option<CacheEvent>,
}

impl CacheCounters {
    /// Lookups only bump counters so the lookup path stays allocation free.
    #[inline]
    pub fn record_hit(&mut self) {
        self.hits = self.hits.saturating_add(1);
    }

    #[inline]
    pub fn record_miss(&mut self) {
        self.misses = self.misses.saturating_add(1);
    }

    #[inline]
    pub fn record_insert(&mut self, detail: String) {
        self.inserts = self.inserts.saturating_add(1);
        self.last_event = Some(CacheEvent::new(CacheEventKind::Insert, detail));
    }

    #[inline]
    pub fn record_eviction(&mut self, detail: String, count: u64) {
        self.evictions = self.evictions.saturating_add(count);
        self.last_event = Some(CacheEvent::new(CacheEventKind::Evicted, detail));
    }

    #[inline]
    pub fn record_reject(&mut self, detail: String) {
        self.rejects = self.rejects.saturating_add(1);
        self.last_event = Some(CacheEvent::new(CacheEventKind::Rejected, detail));
    }

    #[inline]
    pub fn record_rebase(&mut self, detail: String) {
        self.rebases = self.rebases.saturating_add(1);
        self.last_event = Some(CacheEvent::new(CacheEventKind::Rebased, detail));
    }

    #[inline]
    pub fn record_clear(&mut self, evicted: u64) {
        self.evictions = self.evictions.saturating_add(evicted);
        self.last_event = Some(CacheEvent::new(CacheEventKind::Cleared, format!("{evicted} entries")));
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

/// Point-in-time statistics of a [`KernelCache`](super::KernelCache).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KernelCacheMetrics {
    pub live: usize,
    pub capacity: usize,
    pub max_entries: usize,
    pub block_size: usize,
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub refresh: u32,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub rejects: u64,
    pub rebases: u64,
    pub last_event: Option<CacheEvent>,
}

impl KernelCacheMetrics {
    /// Share of lookups that hit, or `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.hits + self.misses;
        (lookups > 0).then(|| self.hits as f64 / lookups as f64)
    }
}

impl fmt::Display for KernelCacheMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "live entries : {}/{} (max {})", self.live, self.capacity, self.max_entries)?;
        writeln!(
            f,
            "storage      : {} of {} bytes free ({} per block)",
            self.free_bytes, self.total_bytes, self.block_size
        )?;
        write!(
            f,
            "lookups      : {} hits, {} misses",
            self.hits, self.misses
        )?;
        if let Some(rate) = self.hit_rate() {
            write!(f, " ({:.1}% hit rate)", rate * 100.0)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "mutations    : {} inserts, {} evictions, {} rejects, {} rebases",
            self.inserts, self.evictions, self.rejects, self.rebases
        )?;
        match &self.last_event {
            Some(event) => write!(f, "last event   : {event}"),
            None => write!(f, "last event   : none"),
        }
    }
}
