//! Chunked arena backing the payload bytes of cache slots.

/// Byte alignment of every block handed out by the store.
pub(crate) const BLOCK_ALIGN: usize = std::mem::align_of::<u64>();

/// Location of one fixed-size block inside the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockRef {
    chunk: u32,
    offset: usize,
}

/// A single growth allocation holding a batch of blocks.
struct StoreChunk {
    words: Box<[u64]>,
    blocks: usize,
}

/// Growable arena of fixed-size byte blocks.
///
/// Blocks never move once allocated: growth appends a new chunk and leaves
/// existing chunks untouched, so a [`BlockRef`] stays valid for the lifetime
/// of the store. Each block starts on a [`BLOCK_ALIGN`] boundary.
pub(crate) struct BinaryStore {
    chunks: Vec<StoreChunk>,
    block_size: usize,
    stride: usize,
}

impl BinaryStore {
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            block_size,
            stride: block_size.next_multiple_of(BLOCK_ALIGN),
        }
    }

    /// Allocates one zeroed chunk of `count` blocks and returns their refs in order.
    pub(crate) fn grow(&mut self, count: usize) -> Vec<BlockRef> {
        let chunk = u32::try_from(self.chunks.len()).unwrap_or(u32::MAX);
        let words = vec![0u64; count * self.stride / BLOCK_ALIGN].into_boxed_slice();
        self.chunks.push(StoreChunk { words, blocks: count });
        (0..count)
            .map(|index| BlockRef {
                chunk,
                offset: index * self.stride,
            })
            .collect()
    }

    #[inline]
    pub(crate) fn block(&self, block: BlockRef) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.chunks[block.chunk as usize].words);
        &bytes[block.offset..block.offset + self.block_size]
    }

    #[inline]
    pub(crate) fn block_mut(&mut self, block: BlockRef) -> &mut [u8] {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.chunks[block.chunk as usize].words);
        &mut bytes[block.offset..block.offset + self.block_size]
    }

    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    pub(crate) fn block_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.blocks).sum()
    }

    #[cfg(test)]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Usable payload bytes across all blocks.
    pub(crate) fn total_bytes(&self) -> usize {
        self.block_count() * self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_aligned_and_disjoint() {
        let mut store = BinaryStore::new(13);
        let blocks = store.grow(3);
        assert_eq!(blocks.len(), 3);

        for (index, block) in blocks.iter().enumerate() {
            store.block_mut(*block).fill(index as u8 + 1);
        }
        for (index, block) in blocks.iter().enumerate() {
            let bytes = store.block(*block);
            assert_eq!(bytes.len(), 13);
            assert_eq!(bytes.as_ptr() as usize % BLOCK_ALIGN, 0);
            assert!(bytes.iter().all(|&b| b == index as u8 + 1));
        }
    }

    #[test]
    fn growth_keeps_existing_blocks() {
        let mut store = BinaryStore::new(16);
        let first = store.grow(2);
        store.block_mut(first[1]).copy_from_slice(&[7; 16]);
        let second = store.grow(4);

        assert_eq!(store.chunk_count(), 2);
        assert_eq!(store.block_count(), 6);
        assert_eq!(store.total_bytes(), 96);
        assert_eq!(store.block(first[1]), &[7; 16]);
        assert!(store.block(second[3]).iter().all(|&b| b == 0));
    }
}
