//! Environment variables sizing the combined-kernel cache.

use super::EnvVar;
use super::value::{TypedEnvVar, format_display, parse_u32, parse_usize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEnvVar {
    /// Hard ceiling on live combined kernels.
    MaxCombinedKernels,
    /// Fixed byte capacity of each cache slot.
    CacheBlockSize,
    /// Slots added per table growth step.
    NewCombinedKernels,
    /// Recency counter value above which live counters are rebased.
    RefreshRebaseThreshold,
    /// Amount subtracted from every recency counter during a rebase.
    RefreshRebaseOffset,
}

impl CacheEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            CacheEnvVar::MaxCombinedKernels => "KDLL_MAX_COMBINED_KERNELS",
            CacheEnvVar::CacheBlockSize => "KDLL_CACHE_BLOCK_SIZE",
            CacheEnvVar::NewCombinedKernels => "KDLL_NEW_COMBINED_KERNELS",
            CacheEnvVar::RefreshRebaseThreshold => "KDLL_REFRESH_REBASE_THRESHOLD",
            CacheEnvVar::RefreshRebaseOffset => "KDLL_REFRESH_REBASE_OFFSET",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Cache(self)
    }
}

pub const MAX_COMBINED_KERNELS: TypedEnvVar<usize> =
    TypedEnvVar::new(CacheEnvVar::MaxCombinedKernels.into_env(), parse_usize, format_display);

pub const CACHE_BLOCK_SIZE: TypedEnvVar<usize> = TypedEnvVar::new(CacheEnvVar::CacheBlockSize.into_env(), parse_usize, format_display);

pub const NEW_COMBINED_KERNELS: TypedEnvVar<usize> =
    TypedEnvVar::new(CacheEnvVar::NewCombinedKernels.into_env(), parse_usize, format_display);

pub const REFRESH_REBASE_THRESHOLD: TypedEnvVar<u32> =
    TypedEnvVar::new(CacheEnvVar::RefreshRebaseThreshold.into_env(), parse_u32, format_display);

pub const REFRESH_REBASE_OFFSET: TypedEnvVar<u32> =
    TypedEnvVar::new(CacheEnvVar::RefreshRebaseOffset.into_env(), parse_u32, format_display);
