//! The combined-kernel cache: lookup, insertion and garbage collection.

use kdll_instrumentation::{MetricEvent, record_metric};
use rustc_hash::FxHashMap;
use tracing::{debug, error, info_span, trace, warn};

use super::config::{KernelCacheConfig, KernelCacheConfigError};
use super::entry_table::{CacheSlot, EntryId, EntryTable, SlotLayout};
use super::hash_index::{HashHandle, HashIndex};
use super::metrics::{CacheCounters, KernelCacheMetrics};
use crate::csc::CscParams;
use crate::error::KernelCacheError;
use crate::filter::{ColorSpace, DisplayFilter, FILTER_ENTRY_SIZE, FilterEntry, filter_bytes, filter_hash};

/// First kernel-cache id handed out; ids wrap back here after `i32::MAX`.
pub const FIRST_KCID: i32 = 0x0001_0000;

/// Kernel-unique id carried by combined kernels, which have no component id.
pub const COMBINED_KUID: i32 = -1;

/// Longest filter accepted by [`KernelCache::add_kernel`].
pub const MAX_FILTER_ENTRIES: usize = 32;

/// Advances a KCID within `FIRST_KCID..=i32::MAX`, wrapping to `FIRST_KCID`.
#[inline]
pub const fn next_kcid(kcid: i32) -> i32 {
    FIRST_KCID + (kcid - 0x0000_ffff) % 0x7fff_0000
}

/// Bytes an insert reserves: the kernel, room for two filter copies,
/// the CSC parameters and the color-fill tag.
#[inline]
pub const fn required_slot_bytes(kernel_len: usize, filter_len: usize) -> usize {
    kernel_len + 2 * filter_len * FILTER_ENTRY_SIZE + CscParams::SIZE + std::mem::size_of::<i32>()
}

/// Tells garbage collection which kernels the renderer still has in flight.
///
/// In-flight kernels are never evicted.
pub trait InFlightQuery {
    fn is_in_flight(&self, kcid: i32) -> bool;
}

/// Nothing is in flight; every live entry may be evicted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverInFlight;

impl InFlightQuery for NeverInFlight {
    #[inline]
    fn is_in_flight(&self, _kcid: i32) -> bool {
        false
    }
}

impl<F> InFlightQuery for F
where
    F: Fn(i32) -> bool,
{
    #[inline]
    fn is_in_flight(&self, kcid: i32) -> bool {
        self(kcid)
    }
}

/// A freshly built kernel and everything stored alongside it.
#[derive(Clone, Copy, Debug)]
pub struct KernelBuild<'a> {
    pub kernel: &'a [u8],
    /// Filter the kernel was built against, possibly rewritten by rule matching.
    pub filter: &'a [FilterEntry],
    /// Filter as originally requested; future lookups match against it.
    pub original_filter: &'a [FilterEntry],
    /// Hash of `original_filter`.
    pub hash: u32,
    pub csc_params: CscParams,
    pub colorfill_cspace: ColorSpace,
}

impl<'a> KernelBuild<'a> {
    /// A build whose original and modified filters are the same.
    pub fn new(kernel: &'a [u8], filter: &'a [FilterEntry]) -> Self {
        Self {
            kernel,
            filter,
            original_filter: filter,
            hash: filter_hash(filter),
            csc_params: CscParams::default(),
            colorfill_cspace: ColorSpace::None,
        }
    }

    /// Sets the lookup filter and recomputes the hash from it.
    #[must_use]
    pub fn with_original_filter(mut self, original: &'a [FilterEntry]) -> Self {
        self.original_filter = original;
        self.hash = filter_hash(original);
        self
    }

    /// Overrides the lookup hash, e.g. with one computed by the caller.
    #[must_use]
    pub fn with_hash(mut self, hash: u32) -> Self {
        self.hash = hash;
        self
    }

    #[must_use]
    pub fn with_csc_params(mut self, params: CscParams) -> Self {
        self.csc_params = params;
        self
    }

    #[must_use]
    pub fn with_colorfill_cspace(mut self, cspace: ColorSpace) -> Self {
        self.colorfill_cspace = cspace;
        self
    }
}

/// Borrowed view of one live cache entry.
#[derive(Clone, Copy)]
pub struct CachedKernel<'a> {
    slot: &'a CacheSlot,
    payload: &'a [u8],
}

impl<'a> CachedKernel<'a> {
    #[inline]
    pub fn kcid(&self) -> i32 {
        self.slot.kcid
    }

    #[inline]
    pub fn kuid(&self) -> i32 {
        self.slot.kuid
    }

    /// Recency stamp; larger is more recently used.
    #[inline]
    pub fn refresh(&self) -> u32 {
        self.slot.refresh
    }

    /// Kernel size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.slot.layout.kernel_len
    }

    /// Bytes reserved in the slot for this kernel and its metadata.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.slot.reserved
    }

    #[inline]
    pub fn kernel(&self) -> &'a [u8] {
        &self.payload[..self.slot.layout.kernel_len]
    }

    /// The filter the kernel was built against.
    #[inline]
    pub fn filter(&self) -> &'a [FilterEntry] {
        bytemuck::cast_slice(&self.payload[self.slot.layout.filter_range()])
    }

    #[inline]
    pub fn csc_params(&self) -> &'a CscParams {
        bytemuck::from_bytes(&self.payload[self.slot.layout.csc_range()])
    }

    pub fn colorfill_cspace(&self) -> ColorSpace {
        let raw: i32 = bytemuck::pod_read_unaligned(&self.payload[self.slot.layout.cspace_range()]);
        ColorSpace::from_raw(raw).unwrap_or_default()
    }
}

impl std::fmt::Debug for CachedKernel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKernel")
            .field("kcid", &format_args!("{:#x}", self.kcid()))
            .field("kuid", &self.kuid())
            .field("refresh", &self.refresh())
            .field("size", &self.size())
            .field("filter_len", &self.slot.layout.filter_len)
            .finish()
    }
}

/// Hash-indexed, pool-allocated store of combined kernels.
///
/// Lookups match on the original filter; each entry keeps the (possibly
/// modified) filter, CSC parameters and color-fill color space it was built
/// with. Once the configured maximum is live, inserting evicts the least
/// recently used entry that is not in flight.
///
/// The cache has no internal locking; callers sharing one instance must hold
/// a lock across a whole find-or-insert sequence.
pub struct KernelCache {
    config: KernelCacheConfig,
    table: EntryTable,
    index: HashIndex,
    by_kcid: FxHashMap<i32, EntryId>,
    refresh: u32,
    next_kcid: i32,
    counters: CacheCounters,
}

impl KernelCache {
    /// Validates `config` and preallocates the first batch of slots.
    pub fn new(config: KernelCacheConfig) -> Result<Self, KernelCacheConfigError> {
        config.validate()?;
        let mut table = EntryTable::new(config.block_size, config.growth_batch, config.max_combined_kernels);
        if let Err(error) = table.grow() {
            warn!(%error, "initial kernel cache batch was not allocated");
        }
        Ok(Self {
            config,
            table,
            index: HashIndex::new(config.max_combined_kernels),
            by_kcid: FxHashMap::default(),
            refresh: 0,
            next_kcid: FIRST_KCID,
            counters: CacheCounters::default(),
        })
    }

    pub fn from_env() -> Result<Self, KernelCacheConfigError> {
        Self::new(KernelCacheConfig::from_env()?)
    }

    #[inline]
    pub fn config(&self) -> &KernelCacheConfig {
        &self.config
    }

    /// Finds the kernel stored for exactly this original filter and hash.
    ///
    /// A hit marks the entry as most recently used. Only the in-process
    /// counters are updated; no metric event is emitted.
    pub fn find_combined_kernel(&mut self, filter: &[FilterEntry], hash: u32) -> Option<CachedKernel<'_>> {
        let Some((_, id)) = self.index.lookup(hash, filter) else {
            self.counters.record_miss();
            trace!(hash = format_args!("{hash:#010x}"), "combined kernel miss");
            return None;
        };

        let stamp = self.next_refresh();
        self.table.slot_mut(id).refresh = stamp;
        self.counters.record_hit();
        trace!(
            hash = format_args!("{hash:#010x}"),
            kcid = format_args!("{:#x}", self.table.slot(id).kcid),
            refresh = stamp,
            "combined kernel hit"
        );
        Some(self.view(id))
    }

    /// Stores a newly built kernel, evicting the least recently used entry if
    /// the cache is full.
    ///
    /// If the original filter and hash are already stored, the existing entry
    /// is refreshed and returned instead of binding a second one.
    ///
    /// On failure the cache holds the same entries it held before the call,
    /// apart from an eviction garbage collection already completed.
    pub fn add_kernel(
        &mut self,
        build: &KernelBuild<'_>,
        in_flight: &impl InFlightQuery,
    ) -> Result<CachedKernel<'_>, KernelCacheError> {
        let span = info_span!(
            "kdll_add_kernel",
            hash = format_args!("{:#010x}", build.hash),
            kernel_bytes = build.kernel.len()
        );
        let _guard = span.enter();

        if build.kernel.is_empty() {
            return Err(self.reject(KernelCacheError::EmptyKernel));
        }
        let longest = build.filter.len().max(build.original_filter.len());
        if longest > MAX_FILTER_ENTRIES {
            return Err(self.reject(KernelCacheError::FilterTooLong {
                len: longest,
                max: MAX_FILTER_ENTRIES,
            }));
        }
        let layout = SlotLayout::new(build.kernel.len(), build.filter.len());
        let required = required_slot_bytes(build.kernel.len(), build.filter.len()).max(layout.end());
        if required > self.table.block_size() {
            return Err(self.reject(KernelCacheError::OversizedKernel {
                required,
                block_size: self.table.block_size(),
            }));
        }

        if let Some((_, id)) = self.index.lookup(build.hash, build.original_filter) {
            let refresh = self.next_refresh();
            self.table.slot_mut(id).refresh = refresh;
            debug!(
                kcid = format_args!("{:#x}", self.table.slot(id).kcid),
                refresh,
                "combined kernel already cached, keeping the stored entry"
            );
            return Ok(self.view(id));
        }

        if let Err(error) = self.collect_garbage(in_flight) {
            return Err(self.reject(error));
        }
        let id = match self.table.allocate(required) {
            Ok(id) => id,
            Err(error) => return Err(self.reject(error)),
        };
        let Some(handle) = self.index.allocate(build.hash) else {
            self.table.release(id);
            return Err(self.reject(KernelCacheError::HashPoolExhausted));
        };

        let kcid = self.next_kcid;
        self.next_kcid = next_kcid(kcid);
        let refresh = self.next_refresh();

        let payload = self.table.payload_mut(id);
        payload[..layout.kernel_len].copy_from_slice(build.kernel);
        payload[layout.filter_range()].copy_from_slice(filter_bytes(build.filter));
        payload[layout.csc_range()].copy_from_slice(build.csc_params.as_bytes());
        payload[layout.cspace_range()].copy_from_slice(&build.colorfill_cspace.raw().to_ne_bytes());

        let slot = self.table.slot_mut(id);
        slot.kuid = COMBINED_KUID;
        slot.kcid = kcid;
        slot.refresh = refresh;
        slot.hash_entry = Some(handle);
        slot.layout = layout;

        self.index.bind(handle, build.original_filter, id);
        debug_assert_eq!(self.index.live(), self.table.live(), "one hash entry per live slot");
        if let Some(stale) = self.by_kcid.insert(kcid, id) {
            debug!(kcid = format_args!("{kcid:#x}"), ?stale, "kernel cache id reused after wrapping");
        }

        self.counters
            .record_insert(format!("kcid={kcid:#x} bytes={} hash={:#010x}", build.kernel.len(), build.hash));
        record_metric!(MetricEvent::KernelCacheInsert {
            kcid,
            kernel_bytes: build.kernel.len() as u64,
            slot_bytes: required as u64,
        });
        debug!(
            kcid = format_args!("{kcid:#x}"),
            refresh,
            live = self.table.live(),
            filter = %DisplayFilter(build.filter),
            "stored combined kernel"
        );
        Ok(self.view(id))
    }

    /// Makes room for one more entry.
    ///
    /// Rebases recency stamps when the counter nears overflow, then, if the
    /// cache is full, evicts the evictable entry with the smallest stamp
    /// (first in scan order on ties).
    ///
    /// # Panics
    ///
    /// Panics if the chosen entry and its hash entry do not point at each
    /// other; the cache's bookkeeping is corrupted at that point.
    pub fn collect_garbage(&mut self, in_flight: &impl InFlightQuery) -> Result<(), KernelCacheError> {
        let span = info_span!("kdll_gc", live = self.table.live());
        let _guard = span.enter();

        self.rebase_if_needed();
        if self.table.live() < self.table.max_entries() {
            return Ok(());
        }

        let mut oldest: Option<(EntryId, u32)> = None;
        for (id, slot) in self.table.iter() {
            if slot.is_free() || in_flight.is_in_flight(slot.kcid) {
                continue;
            }
            if oldest.is_none_or(|(_, refresh)| slot.refresh < refresh) {
                oldest = Some((id, slot.refresh));
            }
        }
        let Some((id, _)) = oldest else {
            return Err(KernelCacheError::NothingEvictable {
                live: self.table.live(),
            });
        };

        let slot = self.table.slot(id);
        let kcid = slot.kcid;
        let handle = slot.hash_entry;
        let owned = handle.is_some_and(|handle| self.index.slot(handle) == Some(id));
        if !owned {
            error!(
                kcid = format_args!("{kcid:#x}"),
                ?handle,
                "kernel cache entry selected for eviction is not owned by its hash entry"
            );
        }
        assert!(owned, "kernel cache bookkeeping corrupted: entry {kcid:#x} is not bound to hash entry {handle:?}");
        if let Some(handle) = handle {
            self.evict(id, handle);
        }
        Ok(())
    }

    fn evict(&mut self, id: EntryId, handle: HashHandle) {
        let slot = self.table.slot(id);
        let (kcid, refresh) = (slot.kcid, slot.refresh);

        self.index.release(handle);
        self.table.release(id);
        if self.by_kcid.get(&kcid) == Some(&id) {
            self.by_kcid.remove(&kcid);
        }

        let live_after = self.table.live();
        self.counters
            .record_eviction(format!("kcid={kcid:#x} refresh={refresh}"), 1);
        record_metric!(MetricEvent::KernelCacheEviction {
            kcid,
            refresh,
            live_after: live_after as u64,
        });
        debug!(kcid = format_args!("{kcid:#x}"), refresh, live_after, "evicted combined kernel");
    }

    /// Post-increments the recency counter.
    fn next_refresh(&mut self) -> u32 {
        self.rebase_if_needed();
        let stamp = self.refresh;
        self.refresh += 1;
        stamp
    }

    /// Shifts the counter and every live stamp down by the rebase offset once
    /// the counter passes the threshold. Stamps below the offset become zero.
    fn rebase_if_needed(&mut self) {
        if self.refresh <= self.config.rebase_threshold {
            return;
        }
        let offset = self.config.rebase_offset;
        self.refresh -= offset;
        for slot in self.table.iter_mut() {
            if !slot.is_free() {
                slot.refresh = slot.refresh.saturating_sub(offset);
            }
        }

        self.counters
            .record_rebase(format!("offset={offset:#x} counter={:#x}", self.refresh));
        record_metric!(MetricEvent::KernelCacheRebase {
            offset,
            counter_after: self.refresh,
        });
        debug!(offset, counter = self.refresh, "rebased kernel cache recency counters");
    }

    /// Releases every live entry. Allocated slots and storage are kept.
    pub fn clear(&mut self) {
        let live: Vec<EntryId> = self
            .table
            .iter()
            .filter(|(_, slot)| !slot.is_free())
            .map(|(id, _)| id)
            .collect();
        for id in &live {
            self.table.release(*id);
        }
        self.index.release_all();
        self.by_kcid.clear();
        self.counters.record_clear(live.len() as u64);
        debug!(released = live.len(), "cleared kernel cache");
    }

    /// Live entry with the given kernel-cache id, without touching its recency.
    pub fn get(&self, kcid: i32) -> Option<CachedKernel<'_>> {
        let id = *self.by_kcid.get(&kcid)?;
        let slot = self.table.slot(id);
        (!slot.is_free() && slot.kcid == kcid).then(|| self.view(id))
    }

    /// Live entries in table scan order.
    pub fn iter_live(&self) -> impl Iterator<Item = CachedKernel<'_>> {
        self.table
            .iter()
            .filter(|(_, slot)| !slot.is_free())
            .map(|(id, _)| self.view(id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.live()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.live() == 0
    }

    /// Slots allocated so far, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Current value of the recency counter.
    #[inline]
    pub fn refresh_counter(&self) -> u32 {
        self.refresh
    }

    /// KCID the next insert will receive.
    #[inline]
    pub fn peek_next_kcid(&self) -> i32 {
        self.next_kcid
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    pub fn metrics(&self) -> KernelCacheMetrics {
        KernelCacheMetrics {
            live: self.table.live(),
            capacity: self.table.capacity(),
            max_entries: self.table.max_entries(),
            block_size: self.table.block_size(),
            total_bytes: self.table.total_bytes(),
            free_bytes: self.table.free_bytes(),
            refresh: self.refresh,
            hits: self.counters.hits,
            misses: self.counters.misses,
            inserts: self.counters.inserts,
            evictions: self.counters.evictions,
            rejects: self.counters.rejects,
            rebases: self.counters.rebases,
            last_event: self.counters.last_event.clone(),
        }
    }

    fn reject(&mut self, error: KernelCacheError) -> KernelCacheError {
        warn!(%error, live = self.table.live(), "combined kernel not cached");
        self.counters.record_reject(error.to_string());
        record_metric!(MetricEvent::KernelCacheRejected {
            reason: error.to_string(),
        });
        error
    }

    #[inline]
    fn view(&self, id: EntryId) -> CachedKernel<'_> {
        CachedKernel {
            slot: self.table.slot(id),
            payload: self.table.payload(id),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_refresh_counter(&mut self, refresh: u32) {
        self.refresh = refresh;
    }

    #[cfg(test)]
    pub(crate) fn set_next_kcid(&mut self, kcid: i32) {
        self.next_kcid = kcid;
    }

    #[cfg(test)]
    pub(crate) fn hash_entries_live(&self) -> usize {
        self.index.live()
    }

    #[cfg(test)]
    pub(crate) fn unbind_hash_entry(&mut self, kcid: i32) {
        if let Some(&id) = self.by_kcid.get(&kcid) {
            self.table.slot_mut(id).hash_entry = None;
        }
    }
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("config", &self.config)
            .field("live", &self.table.live())
            .field("capacity", &self.table.capacity())
            .field("refresh", &self.refresh)
            .field("next_kcid", &format_args!("{:#x}", self.next_kcid))
            .finish()
    }
}

#[cfg(test)]
#[path = "eviction_tests.rs"]
mod eviction_tests;
