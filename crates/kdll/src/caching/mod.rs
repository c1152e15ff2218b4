//! Combined-kernel cache.
//!
//! [`KernelCache`] composes three pieces: a chunked binary store holding
//! slot payloads, a slot table grown in fixed batches up to a hard ceiling,
//! and a 256-bucket hash index mapping (hash, original filter) to a slot.

mod binary_store;
pub mod config;
mod engine;
mod entry_table;
mod hash_index;
pub mod metrics;

pub use config::{KernelCacheConfig, KernelCacheConfigError};
pub use engine::{
    COMBINED_KUID, CachedKernel, FIRST_KCID, InFlightQuery, KernelBuild, KernelCache, MAX_FILTER_ENTRIES, NeverInFlight, next_kcid, required_slot_bytes
};
pub use entry_table::EntryId;
pub use hash_index::{HASH_BUCKETS, HashHandle};
pub use metrics::{CacheCounters, CacheEvent, CacheEventKind, KernelCacheMetrics};
