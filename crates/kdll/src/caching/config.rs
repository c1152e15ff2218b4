//! Sizing of the combined-kernel cache.

use kdll_env::{
    CACHE_BLOCK_SIZE, EnvVarError, MAX_COMBINED_KERNELS, NEW_COMBINED_KERNELS, REFRESH_REBASE_OFFSET, REFRESH_REBASE_THRESHOLD
};

pub const DEFAULT_MAX_COMBINED_KERNELS: usize = 64;
pub const DEFAULT_CACHE_BLOCK_SIZE: usize = 128 * 1024;
pub const DEFAULT_NEW_COMBINED_KERNELS: usize = 4;
pub const DEFAULT_REFRESH_REBASE_THRESHOLD: u32 = 0xffff_0000;
pub const DEFAULT_REFRESH_REBASE_OFFSET: u32 = 0x8000_0000;

/// Hash entries are addressed by 1-based `u16` handles.
pub const MAX_HASH_ENTRIES: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum KernelCacheConfigError {
    #[error("cache block size must be non-zero")]
    ZeroBlockSize,
    #[error("growth batch must be non-zero")]
    ZeroBatch,
    #[error("maximum of {max} combined kernels is smaller than one growth batch of {batch}")]
    MaxBelowBatch { max: usize, batch: usize },
    #[error("maximum of {max} combined kernels exceeds the hash entry limit of {limit}")]
    TooManyEntries { max: usize, limit: usize },
    #[error("refresh rebase offset {offset:#x} must be non-zero and no larger than the threshold {threshold:#x}, which must stay below u32::MAX")]
    InvalidRebase { offset: u32, threshold: u32 },
    #[error("failed to read kernel cache configuration: {source}")]
    EnvVar {
        #[from]
        source: EnvVarError,
    },
}

/// Construction-time limits of a [`KernelCache`](super::KernelCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelCacheConfig {
    /// Hard ceiling on live combined kernels (and on allocated slots).
    pub max_combined_kernels: usize,
    /// Bytes available to each slot for kernel, filter copies and parameters.
    pub block_size: usize,
    /// Slots allocated per growth step.
    pub growth_batch: usize,
    /// Recency counter value that triggers a rebase.
    pub rebase_threshold: u32,
    /// Amount subtracted from recency counters during a rebase.
    pub rebase_offset: u32,
}

impl Default for KernelCacheConfig {
    fn default() -> Self {
        Self {
            max_combined_kernels: DEFAULT_MAX_COMBINED_KERNELS,
            block_size: DEFAULT_CACHE_BLOCK_SIZE,
            growth_batch: DEFAULT_NEW_COMBINED_KERNELS,
            rebase_threshold: DEFAULT_REFRESH_REBASE_THRESHOLD,
            rebase_offset: DEFAULT_REFRESH_REBASE_OFFSET,
        }
    }
}

impl KernelCacheConfig {
    /// Defaults overridden by any `KDLL_*` cache variables present in the environment.
    pub fn from_env() -> Result<Self, KernelCacheConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_combined_kernels: MAX_COMBINED_KERNELS.get_or(defaults.max_combined_kernels)?,
            block_size: CACHE_BLOCK_SIZE.get_or(defaults.block_size)?,
            growth_batch: NEW_COMBINED_KERNELS.get_or(defaults.growth_batch)?,
            rebase_threshold: REFRESH_REBASE_THRESHOLD.get_or(defaults.rebase_threshold)?,
            rebase_offset: REFRESH_REBASE_OFFSET.get_or(defaults.rebase_offset)?,
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_max_combined_kernels(mut self, max: usize) -> Self {
        self.max_combined_kernels = max;
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    #[must_use]
    pub fn with_growth_batch(mut self, batch: usize) -> Self {
        self.growth_batch = batch;
        self
    }

    #[must_use]
    pub fn with_rebase(mut self, threshold: u32, offset: u32) -> Self {
        self.rebase_threshold = threshold;
        self.rebase_offset = offset;
        self
    }

    pub fn validate(&self) -> Result<(), KernelCacheConfigError> {
        if self.block_size == 0 {
            return Err(KernelCacheConfigError::ZeroBlockSize);
        }
        if self.growth_batch == 0 {
            return Err(KernelCacheConfigError::ZeroBatch);
        }
        if self.max_combined_kernels < self.growth_batch {
            return Err(KernelCacheConfigError::MaxBelowBatch {
                max: self.max_combined_kernels,
                batch: self.growth_batch,
            });
        }
        if self.max_combined_kernels > MAX_HASH_ENTRIES {
            return Err(KernelCacheConfigError::TooManyEntries {
                max: self.max_combined_kernels,
                limit: MAX_HASH_ENTRIES,
            });
        }
        if self.rebase_offset == 0 || self.rebase_offset > self.rebase_threshold || self.rebase_threshold == u32::MAX {
            return Err(KernelCacheConfigError::InvalidRebase {
                offset: self.rebase_offset,
                threshold: self.rebase_threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kdll_env::{CacheEnvVar, EnvVarGuard};
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_validate() {
        KernelCacheConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn validate_rejects_inconsistent_limits() {
        let base = KernelCacheConfig::default();
        assert!(matches!(
            base.with_block_size(0).validate(),
            Err(KernelCacheConfigError::ZeroBlockSize)
        ));
        assert!(matches!(base.with_growth_batch(0).validate(), Err(KernelCacheConfigError::ZeroBatch)));
        assert!(matches!(
            base.with_max_combined_kernels(2).validate(),
            Err(KernelCacheConfigError::MaxBelowBatch { max: 2, batch: 4 })
        ));
        assert!(matches!(
            base.with_max_combined_kernels(70_000).validate(),
            Err(KernelCacheConfigError::TooManyEntries { .. })
        ));
        assert!(matches!(
            base.with_rebase(100, 200).validate(),
            Err(KernelCacheConfigError::InvalidRebase { offset: 200, threshold: 100 })
        ));
        assert!(matches!(
            base.with_rebase(u32::MAX, 1).validate(),
            Err(KernelCacheConfigError::InvalidRebase { .. })
        ));
    }

    #[test]
    #[serial]
    fn from_env_overrides_defaults() {
        let _env = EnvVarGuard::set(CacheEnvVar::MaxCombinedKernels, "12")
            .and_set(CacheEnvVar::CacheBlockSize, "0x1000")
            .and_set(CacheEnvVar::NewCombinedKernels, "3")
            .and_unset(CacheEnvVar::RefreshRebaseThreshold)
            .and_unset(CacheEnvVar::RefreshRebaseOffset);

        let config = KernelCacheConfig::from_env().expect("valid configuration");
        assert_eq!(config.max_combined_kernels, 12);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.growth_batch, 3);
        assert_eq!(config.rebase_threshold, DEFAULT_REFRESH_REBASE_THRESHOLD);
    }

    #[test]
    #[serial]
    fn from_env_surfaces_parse_and_validation_errors() {
        let _env = EnvVarGuard::unset(CacheEnvVar::RefreshRebaseThreshold)
            .and_unset(CacheEnvVar::RefreshRebaseOffset)
            .and_unset(CacheEnvVar::CacheBlockSize);
        {
            let _max = EnvVarGuard::set(CacheEnvVar::MaxCombinedKernels, "many");
            assert!(matches!(
                KernelCacheConfig::from_env(),
                Err(KernelCacheConfigError::EnvVar { .. })
            ));
        }
        let _sizes = EnvVarGuard::set(CacheEnvVar::MaxCombinedKernels, "8").and_set(CacheEnvVar::NewCombinedKernels, "16");
        assert!(matches!(
            KernelCacheConfig::from_env(),
            Err(KernelCacheConfigError::MaxBelowBatch { max: 8, batch: 16 })
        ));
    }
}
