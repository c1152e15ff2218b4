//! Bucketed chains of (hash, original filter) bindings.

use std::num::NonZeroU16;

use super::entry_table::EntryId;
use crate::filter::FilterEntry;
use crate::hash::fold_hash;

pub const HASH_BUCKETS: usize = 256;

/// 1-based handle of a hash entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HashHandle(NonZeroU16);

impl HashHandle {
    fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index + 1).ok().and_then(NonZeroU16::new).map(Self)
    }

    #[inline]
    fn index(self) -> usize {
        usize::from(self.0.get()) - 1
    }

    #[inline]
    pub fn get(self) -> u16 {
        self.0.get()
    }
}

#[derive(Debug, Default)]
struct HashEntry {
    hash: u32,
    filter: Vec<FilterEntry>,
    next: Option<HashHandle>,
    slot: Option<EntryId>,
}

/// Fixed pool of hash entries threaded through 256 bucket chains.
///
/// Released entries are appended to the tail of the free pool so the least
/// recently released entry is reused first.
pub(crate) struct HashIndex {
    buckets: [Option<HashHandle>; HASH_BUCKETS],
    entries: Vec<HashEntry>,
    pool: Option<HashHandle>,
    last: Option<HashHandle>,
    live: usize,
}

impl HashIndex {
    /// Builds a pool of `capacity` entries, clamped to the 16-bit handle space.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.min(usize::from(u16::MAX));
        let mut entries: Vec<HashEntry> = (0..capacity).map(|_| HashEntry::default()).collect();
        for index in 1..capacity {
            entries[index - 1].next = HashHandle::from_index(index);
        }
        let pool = (capacity > 0).then(|| HashHandle::from_index(0)).flatten();
        let last = capacity.checked_sub(1).and_then(HashHandle::from_index);
        Self {
            buckets: [None; HASH_BUCKETS],
            entries,
            pool,
            last,
            live: 0,
        }
    }

    /// Takes an entry from the free pool and links it at the head of its bucket.
    pub(crate) fn allocate(&mut self, hash: u32) -> Option<HashHandle> {
        let handle = self.pool?;
        let bucket = usize::from(fold_hash(hash));
        let head = self.buckets[bucket];

        let entry = &mut self.entries[handle.index()];
        self.pool = entry.next;
        if self.pool.is_none() {
            self.last = None;
        }
        entry.hash = hash;
        entry.filter.clear();
        entry.slot = None;
        entry.next = head;

        self.buckets[bucket] = Some(handle);
        self.live += 1;
        Some(handle)
    }

    /// Records the original filter and the owning slot of a freshly allocated entry.
    pub(crate) fn bind(&mut self, handle: HashHandle, filter: &[FilterEntry], slot: EntryId) {
        let entry = &mut self.entries[handle.index()];
        entry.filter.clear();
        entry.filter.extend_from_slice(filter);
        entry.slot = Some(slot);
    }

    /// First entry in the bucket chain matching both `hash` and `filter` exactly.
    pub(crate) fn lookup(&self, hash: u32, filter: &[FilterEntry]) -> Option<(HashHandle, EntryId)> {
        let mut cursor = self.buckets[usize::from(fold_hash(hash))];
        while let Some(handle) = cursor {
            let entry = &self.entries[handle.index()];
            if entry.hash == hash
                && entry.filter.as_slice() == filter
                && let Some(slot) = entry.slot
            {
                return Some((handle, slot));
            }
            cursor = entry.next;
        }
        None
    }

    #[inline]
    pub(crate) fn slot(&self, handle: HashHandle) -> Option<EntryId> {
        self.entries.get(handle.index()).and_then(|entry| entry.slot)
    }

    /// Unlinks the entry from its bucket and appends it to the free pool.
    ///
    /// Returns `false` if the handle was not linked in its bucket.
    pub(crate) fn release(&mut self, handle: HashHandle) -> bool {
        let Some(entry) = self.entries.get(handle.index()) else {
            return false;
        };
        let bucket = usize::from(fold_hash(entry.hash));
        let next = entry.next;

        if self.buckets[bucket] == Some(handle) {
            self.buckets[bucket] = next;
        } else {
            let mut cursor = self.buckets[bucket];
            loop {
                let Some(current) = cursor else {
                    return false;
                };
                let current_entry = &mut self.entries[current.index()];
                if current_entry.next == Some(handle) {
                    current_entry.next = next;
                    break;
                }
                cursor = current_entry.next;
            }
        }

        let entry = &mut self.entries[handle.index()];
        entry.next = None;
        entry.slot = None;
        match self.last {
            Some(tail) => self.entries[tail.index()].next = Some(handle),
            None => self.pool = Some(handle),
        }
        self.last = Some(handle);
        self.live -= 1;
        true
    }

    /// Returns every linked entry to the pool in bucket order.
    pub(crate) fn release_all(&mut self) {
        for bucket in 0..HASH_BUCKETS {
            while let Some(head) = self.buckets[bucket] {
                self.release(head);
            }
        }
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    /// Length of the chain that `hash` folds into.
    pub(crate) fn chain_len(&self, hash: u32) -> usize {
        let mut len = 0;
        let mut cursor = self.buckets[usize::from(fold_hash(hash))];
        while let Some(handle) = cursor {
            len += 1;
            cursor = self.entries[handle.index()].next;
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Format, Layer};

    fn filter(format: Format) -> Vec<FilterEntry> {
        vec![FilterEntry::new(Layer::MainVideo, format), FilterEntry::new(Layer::RenderTarget, Format::A8R8G8B8)]
    }

    /// Two hashes that differ but fold into the same bucket.
    const SAME_BUCKET: (u32, u32) = (0x0000_0001, 0x0001_0000);

    #[test]
    fn colliding_hashes_share_a_bucket() {
        assert_ne!(SAME_BUCKET.0, SAME_BUCKET.1);
        assert_eq!(fold_hash(SAME_BUCKET.0), fold_hash(SAME_BUCKET.1));
    }

    #[test]
    fn lookup_requires_exact_hash_and_filter() {
        let mut index = HashIndex::new(4);
        let nv12 = filter(Format::Nv12);
        let yuy2 = filter(Format::Yuy2);

        let a = index.allocate(7).expect("pool has room");
        index.bind(a, &nv12, EntryId::new(0));
        let b = index.allocate(7).expect("pool has room");
        index.bind(b, &yuy2, EntryId::new(1));

        assert_eq!(index.lookup(7, &nv12), Some((a, EntryId::new(0))));
        assert_eq!(index.lookup(7, &yuy2), Some((b, EntryId::new(1))));
        assert_eq!(index.lookup(8, &nv12), None);
        assert_eq!(index.lookup(7, &nv12[..1]), None);
        assert_eq!(index.chain_len(7), 2);
    }

    #[test]
    fn release_unlinks_head_and_interior_entries() {
        let mut index = HashIndex::new(4);
        let (h0, h1) = SAME_BUCKET;
        let f = filter(Format::Nv12);
        let first = index.allocate(h0).expect("room");
        index.bind(first, &f, EntryId::new(0));
        let second = index.allocate(h1).expect("room");
        index.bind(second, &f, EntryId::new(1));
        let third = index.allocate(h0).expect("room");
        index.bind(third, &filter(Format::P010), EntryId::new(2));
        assert_eq!(index.chain_len(h0), 3);

        // chain is third -> second -> first; drop the middle then the head
        assert!(index.release(second));
        assert_eq!(index.chain_len(h0), 2);
        assert_eq!(index.lookup(h1, &f), None);
        assert!(index.release(third));
        assert_eq!(index.lookup(h0, &f), Some((first, EntryId::new(0))));
        assert_eq!(index.live(), 1);
        assert!(!index.release(third), "already released");
    }

    #[test]
    fn pool_reuses_entries_first_in_first_out() {
        let mut index = HashIndex::new(3);
        let handles: Vec<_> = (0..3).map(|h| index.allocate(h).expect("room")).collect();
        assert_eq!(handles.iter().map(|h| h.get()).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(index.allocate(99).is_none(), "pool exhausted");

        index.release(handles[2]);
        index.release(handles[0]);
        assert_eq!(index.allocate(10), Some(handles[2]));
        assert_eq!(index.allocate(11), Some(handles[0]));
        assert!(index.allocate(12).is_none());
    }

    #[test]
    fn release_all_empties_every_bucket() {
        let mut index = HashIndex::new(8);
        for hash in 0..8u32 {
            let handle = index.allocate(hash * 0x0101).expect("room");
            index.bind(handle, &filter(Format::Nv12), EntryId::new(hash as usize));
        }
        index.release_all();
        assert_eq!(index.live(), 0);
        assert_eq!(index.capacity(), 8);
        assert!((0..8).all(|_| index.allocate(1).is_some()));
    }
}
