//! Slot table layered over the binary store.

use kdll_instrumentation::{MetricEvent, record_metric};

use super::binary_store::{BinaryStore, BlockRef};
use super::hash_index::HashHandle;
use crate::csc::CscParams;
use crate::error::KernelCacheError;
use crate::filter::{FILTER_ENTRY_SIZE, FilterEntry};

/// Id value marking a free slot.
pub(crate) const FREE: i32 = -1;

/// Position of a slot in table scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Offsets of the payload regions inside a slot's block:
/// kernel bytes, modified filter, CSC parameters, color-fill tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SlotLayout {
    pub(crate) kernel_len: usize,
    pub(crate) filter_offset: usize,
    pub(crate) filter_len: usize,
    pub(crate) csc_offset: usize,
    pub(crate) cspace_offset: usize,
}

impl SlotLayout {
    pub(crate) fn new(kernel_len: usize, filter_len: usize) -> Self {
        let filter_offset = kernel_len.next_multiple_of(std::mem::align_of::<FilterEntry>());
        let csc_offset = filter_offset + filter_len * FILTER_ENTRY_SIZE;
        let cspace_offset = csc_offset + CscParams::SIZE;
        Self {
            kernel_len,
            filter_offset,
            filter_len,
            csc_offset,
            cspace_offset,
        }
    }

    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.cspace_offset + std::mem::size_of::<i32>()
    }

    #[inline]
    pub(crate) fn filter_range(&self) -> std::ops::Range<usize> {
        self.filter_offset..self.csc_offset
    }

    #[inline]
    pub(crate) fn csc_range(&self) -> std::ops::Range<usize> {
        self.csc_offset..self.cspace_offset
    }

    #[inline]
    pub(crate) fn cspace_range(&self) -> std::ops::Range<usize> {
        self.cspace_offset..self.end()
    }
}

/// Metadata for one cache slot. The payload lives in the binary store.
#[derive(Clone, Debug)]
pub(crate) struct CacheSlot {
    pub(crate) kuid: i32,
    pub(crate) kcid: i32,
    pub(crate) refresh: u32,
    /// Bytes reserved at allocation.
    pub(crate) reserved: usize,
    pub(crate) hash_entry: Option<HashHandle>,
    pub(crate) layout: SlotLayout,
    block: BlockRef,
}

impl CacheSlot {
    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        self.kcid == FREE
    }
}

/// Bounded table of cache slots, grown in batches up to a hard ceiling.
///
/// Slots are never removed once allocated; a slot is free when its KCID holds
/// the [`FREE`] sentinel.
pub(crate) struct EntryTable {
    slots: Vec<CacheSlot>,
    store: BinaryStore,
    max_entries: usize,
    growth_batch: usize,
    live: usize,
    free_bytes: usize,
}

impl EntryTable {
    pub(crate) fn new(block_size: usize, growth_batch: usize, max_entries: usize) -> Self {
        Self {
            slots: Vec::new(),
            store: BinaryStore::new(block_size),
            max_entries,
            growth_batch,
            live: 0,
            free_bytes: 0,
        }
    }

    /// Reserves a free slot for `size` payload bytes, growing the table if none is free.
    pub(crate) fn allocate(&mut self, size: usize) -> Result<EntryId, KernelCacheError> {
        let block_size = self.store.block_size();
        if size > block_size {
            return Err(KernelCacheError::OversizedKernel {
                required: size,
                block_size,
            });
        }

        let id = match self.slots.iter().position(CacheSlot::is_free) {
            Some(index) => EntryId::new(index),
            None => self.grow()?,
        };

        let slot = &mut self.slots[id.index()];
        slot.kuid = 0;
        slot.kcid = 0;
        slot.refresh = 0;
        slot.reserved = size;
        slot.hash_entry = None;
        slot.layout = SlotLayout::default();

        self.live += 1;
        self.free_bytes -= block_size;
        Ok(id)
    }

    /// Appends one batch of free slots and returns the first new one.
    pub(crate) fn grow(&mut self) -> Result<EntryId, KernelCacheError> {
        let capacity = self.slots.len();
        let step = self.growth_batch.min(self.max_entries.saturating_sub(capacity));
        if step == 0 {
            tracing::warn!(capacity, max = self.max_entries, "kernel cache table cannot grow further");
            return Err(KernelCacheError::CapacityExhausted {
                capacity,
                max: self.max_entries,
            });
        }

        let first = EntryId::new(capacity);
        for block in self.store.grow(step) {
            self.slots.push(CacheSlot {
                kuid: FREE,
                kcid: FREE,
                refresh: 0,
                reserved: 0,
                hash_entry: None,
                layout: SlotLayout::default(),
                block,
            });
        }
        self.free_bytes += step * self.store.block_size();

        tracing::debug!(capacity = self.slots.len(), max = self.max_entries, "kernel cache table grew");
        record_metric!(MetricEvent::KernelCacheGrowth {
            capacity: self.slots.len() as u64,
            max: self.max_entries as u64,
        });
        Ok(first)
    }

    /// Marks the slot free. The slot keeps its block and its place in scan order.
    pub(crate) fn release(&mut self, id: EntryId) {
        let slot = &mut self.slots[id.index()];
        if slot.is_free() {
            return;
        }
        slot.kuid = FREE;
        slot.kcid = FREE;
        slot.hash_entry = None;
        self.live -= 1;
        self.free_bytes += self.store.block_size();
    }

    #[inline]
    pub(crate) fn slot(&self, id: EntryId) -> &CacheSlot {
        &self.slots[id.index()]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, id: EntryId) -> &mut CacheSlot {
        &mut self.slots[id.index()]
    }

    /// Full block backing the slot.
    #[inline]
    pub(crate) fn payload(&self, id: EntryId) -> &[u8] {
        self.store.block(self.slots[id.index()].block)
    }

    #[inline]
    pub(crate) fn payload_mut(&mut self, id: EntryId) -> &mut [u8] {
        let block = self.slots[id.index()].block;
        self.store.block_mut(block)
    }

    /// Every slot in scan order, free or live.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryId, &CacheSlot)> {
        self.slots.iter().enumerate().map(|(index, slot)| (EntryId::new(index), slot))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut CacheSlot> {
        self.slots.iter_mut()
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.store.block_size()
    }

    #[inline]
    pub(crate) fn total_bytes(&self) -> usize {
        self.store.total_bytes()
    }

    #[inline]
    pub(crate) fn free_bytes(&self) -> usize {
        self.free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_packs_regions_in_order() {
        let layout = SlotLayout::new(10, 2);
        assert_eq!(layout.filter_offset, 12);
        assert_eq!(layout.filter_range().len(), 2 * FILTER_ENTRY_SIZE);
        assert_eq!(layout.csc_range().len(), CscParams::SIZE);
        assert_eq!(layout.cspace_range().len(), 4);
        assert_eq!(layout.end(), 12 + 2 * FILTER_ENTRY_SIZE + CscParams::SIZE + 4);
    }

    #[test]
    fn allocate_reuses_free_slots_before_growing() {
        let mut table = EntryTable::new(64, 2, 6);
        let a = table.allocate(10).expect("first batch");
        let b = table.allocate(10).expect("first batch");
        assert_eq!(table.capacity(), 2);

        table.release(a);
        assert_eq!(table.allocate(20), Ok(a));
        assert_eq!(table.slot(a).reserved, 20);

        let c = table.allocate(5).expect("second batch");
        assert_eq!(c, EntryId::new(2));
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.live(), 3);
        assert_ne!(b, c);
    }

    #[test]
    fn oversized_requests_fail_without_growing() {
        let mut table = EntryTable::new(64, 2, 6);
        assert_eq!(
            table.allocate(65),
            Err(KernelCacheError::OversizedKernel {
                required: 65,
                block_size: 64
            })
        );
        assert_eq!(table.capacity(), 0);
    }

    #[test]
    fn growth_stops_at_the_ceiling() {
        let mut table = EntryTable::new(32, 4, 6);
        for _ in 0..6 {
            table.allocate(1).expect("below ceiling");
        }
        assert_eq!(table.capacity(), 6, "last step is clamped to the ceiling");
        assert_eq!(
            table.allocate(1),
            Err(KernelCacheError::CapacityExhausted { capacity: 6, max: 6 })
        );
        assert_eq!(table.free_bytes(), 0);
        assert_eq!(table.total_bytes(), 6 * 32);
    }

    #[test]
    fn release_tracks_free_bytes_once() {
        let mut table = EntryTable::new(16, 2, 2);
        let id = table.allocate(8).expect("room");
        assert_eq!(table.free_bytes(), 16);
        table.release(id);
        table.release(id);
        assert_eq!(table.free_bytes(), 32);
        assert_eq!(table.live(), 0);
        assert!(table.slot(id).is_free());
    }
}
