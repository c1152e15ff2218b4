use thiserror::Error;

/// Failures reported by [`KernelCache::add_kernel`](crate::KernelCache::add_kernel).
///
/// Every variant leaves the cache exactly as it was before the failing call,
/// apart from garbage collection that already completed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelCacheError {
    #[error("built kernel is empty")]
    EmptyKernel,
    #[error("kernel payload of {required} bytes exceeds the {block_size}-byte cache block")]
    OversizedKernel { required: usize, block_size: usize },
    #[error("filter of {len} entries exceeds the supported maximum of {max}")]
    FilterTooLong { len: usize, max: usize },
    #[error("all {live} cached kernels are in flight, nothing can be evicted")]
    NothingEvictable { live: usize },
    #[error("kernel cache capacity exhausted ({capacity} of {max} entries allocated)")]
    CapacityExhausted { capacity: usize, max: usize },
    #[error("kernel hash entry pool exhausted")]
    HashPoolExhausted,
}
