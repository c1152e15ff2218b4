//! Shared process environment helpers for the kernel cache crates.

pub mod environment;

pub use environment::cache::{
    CACHE_BLOCK_SIZE, CacheEnvVar, MAX_COMBINED_KERNELS, NEW_COMBINED_KERNELS, REFRESH_REBASE_OFFSET, REFRESH_REBASE_THRESHOLD,
};
pub use environment::guard::EnvVarGuard;
pub use environment::instrument::{InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH};
pub use environment::value::{EnvVarError, EnvVarFormatError, EnvVarParseError, TypedEnvVar, TypedEnvVarGuard};
pub use environment::{EnvVar, Environment};
