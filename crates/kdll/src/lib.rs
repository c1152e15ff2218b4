//! Cache of combined video-processing kernels.
//!
//! A combined kernel is one compiled binary implementing every step a frame
//! composition needs. The composition is described by a *filter*, an ordered
//! list of [`FilterEntry`] records. [`KernelCache`] finds a previously built
//! kernel for an identical filter or stores a newly built one, evicting the
//! least recently used entry when full.

pub mod caching;
pub mod component;
pub mod csc;
pub mod error;
pub mod filter;
pub mod hash;

pub use caching::{
    CachedKernel, InFlightQuery, KernelBuild, KernelCache, KernelCacheConfig, KernelCacheConfigError, KernelCacheMetrics, NeverInFlight
};
pub use component::{ComponentError, ComponentKernel, ComponentKernels, MAX_COMPONENT_KUID};
pub use csc::{CscMatrix, CscParams};
pub use error::KernelCacheError;
pub use filter::{
    ColorSpace, DisplayFilter, FilterEntry, Format, FormatGroup, Layer, Processing, Rotation, Sampling, filter_bytes, filter_hash
};
pub use hash::{fold_hash, simple_hash};
