//! Seeded synthetic frame workload driven through the kernel cache.

pub mod builder;

use std::collections::VecDeque;
use std::fmt;

use kdll::{
    ColorSpace, FilterEntry, Format, KernelBuild, KernelCache, KernelCacheConfig, KernelCacheConfigError, KernelCacheMetrics, Layer, Processing, Rotation, Sampling, filter_hash
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span};

pub use builder::{BuildError, BuiltKernel, SyntheticKernelBuilder};

const SOURCE_LAYERS: [Layer; 6] = [
    Layer::MainVideo,
    Layer::SubVideo,
    Layer::SubPicture1,
    Layer::SubPicture2,
    Layer::SubPicture3,
    Layer::Graphics,
];
const VIDEO_FORMATS: [Format; 6] = [Format::Nv12, Format::P010, Format::Yuy2, Format::Yv12, Format::Ayuv, Format::P016];
const OVERLAY_FORMATS: [Format; 4] = [Format::A8R8G8B8, Format::Ai44, Format::A8B8G8R8, Format::R5G6B5];
const TARGET_FORMATS: [Format; 3] = [Format::A8R8G8B8, Format::Nv12, Format::Yuy2];
const VIDEO_CSPACES: [ColorSpace; 3] = [ColorSpace::Bt601, ColorSpace::Bt709, ColorSpace::Bt2020];
const SAMPLING: [Sampling; 4] = [Sampling::None, Sampling::Scaling, Sampling::ScalingAvs, Sampling::ScalingAny];
const BLENDS: [Processing; 4] = [Processing::Composite, Processing::SourceBlend, Processing::ConstBlend, Processing::Any];

/// Shape of a replayed workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WorkloadConfig {
    pub frames: usize,
    pub distinct_filters: usize,
    /// Maximum source layers per frame, not counting the render target.
    pub layers: usize,
    /// Kernels of this many most recent frames stay in flight.
    pub pinned: usize,
    pub seed: u64,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] KernelCacheConfigError),
    #[error("kernel build failed: {0}")]
    Build(#[from] BuildError),
}

/// Outcome of a replay, printed as text or JSON.
#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub workload: WorkloadConfig,
    pub filters_generated: usize,
    pub hits: u64,
    pub misses: u64,
    pub kernels_built: u64,
    pub kernel_bytes_built: u64,
    pub uncached_frames: u64,
    pub cache: KernelCacheMetrics,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "replayed {} frames over {} filters (seed {:#x}, up to {} layers, {} frames pinned)",
            self.workload.frames, self.filters_generated, self.workload.seed, self.workload.layers, self.workload.pinned
        )?;
        writeln!(
            f,
            "frames       : {} hits, {} misses, {} built ({} bytes), {} rendered uncached",
            self.hits, self.misses, self.kernels_built, self.kernel_bytes_built, self.uncached_frames
        )?;
        write!(f, "{}", self.cache)
    }
}

/// Random distinct filters; each ends with a render-target entry.
///
/// Fewer than `distinct` filters are returned if the random space runs dry.
pub fn generate_filters(rng: &mut StdRng, distinct: usize, layers: usize) -> Vec<Vec<FilterEntry>> {
    let mut seen = FxHashSet::default();
    let mut filters = Vec::with_capacity(distinct);
    let mut attempts = distinct.saturating_mul(64);

    while filters.len() < distinct && attempts > 0 {
        attempts -= 1;
        let sources = rng.random_range(1..=layers.clamp(1, SOURCE_LAYERS.len()));
        let mut filter = Vec::with_capacity(sources + 1);
        for (index, layer) in SOURCE_LAYERS.iter().take(sources).enumerate() {
            let entry = if index == 0 {
                FilterEntry::new(*layer, pick(rng, &VIDEO_FORMATS))
                    .with_cspace(pick(rng, &VIDEO_CSPACES))
                    .with_sampling(pick(rng, &SAMPLING))
                    .with_rotation(pick(rng, Rotation::ALL))
                    .with_process(Processing::Composite)
            } else {
                FilterEntry::new(*layer, pick(rng, &OVERLAY_FORMATS))
                    .with_cspace(ColorSpace::Srgb)
                    .with_sampling(pick(rng, &SAMPLING))
                    .with_process(pick(rng, &BLENDS))
            };
            filter.push(entry);
        }
        let target_format = pick(rng, &TARGET_FORMATS);
        let target_cspace = if target_format == Format::A8R8G8B8 {
            ColorSpace::Srgb
        } else {
            pick(rng, &VIDEO_CSPACES)
        };
        filter.push(
            FilterEntry::new(Layer::RenderTarget, target_format)
                .with_cspace(target_cspace)
                .with_dither(rng.random_bool(0.25)),
        );

        if seen.insert(filter.clone()) {
            filters.push(filter);
        }
    }
    filters
}

fn pick<T: Copy>(rng: &mut StdRng, values: &[T]) -> T {
    *values.choose(rng).unwrap_or(&values[0])
}

/// Replays `workload` frame by frame: find the combined kernel, build and
/// store it on a miss.
pub fn run(workload: &WorkloadConfig, cache_config: KernelCacheConfig) -> Result<ReplayReport, ReplayError> {
    let mut rng = StdRng::seed_from_u64(workload.seed);
    let filters = generate_filters(&mut rng, workload.distinct_filters, workload.layers);
    let builder = SyntheticKernelBuilder::new()?;
    let mut cache = KernelCache::new(cache_config)?;
    let mut in_flight: VecDeque<i32> = VecDeque::with_capacity(workload.pinned + 1);

    let mut report = ReplayReport {
        workload: *workload,
        filters_generated: filters.len(),
        hits: 0,
        misses: 0,
        kernels_built: 0,
        kernel_bytes_built: 0,
        uncached_frames: 0,
        cache: KernelCacheMetrics::default(),
    };
    info!(filters = filters.len(), frames = workload.frames, "starting kernel cache replay");

    for frame in 0..workload.frames {
        if filters.is_empty() {
            break;
        }
        let span = info_span!("frame", frame);
        let _guard = span.enter();

        // min of two draws favours low indices, giving a skewed popularity
        let index = rng.random_range(0..filters.len()).min(rng.random_range(0..filters.len()));
        let filter = &filters[index];
        let hash = filter_hash(filter);

        let hit = cache.find_combined_kernel(filter, hash).map(|kernel| kernel.kcid());
        let kcid = match hit {
            Some(kcid) => {
                report.hits += 1;
                Some(kcid)
            }
            None => {
                report.misses += 1;
                let built = builder.build(filter)?;
                report.kernels_built += 1;
                report.kernel_bytes_built += built.kernel.len() as u64;

                let build = KernelBuild::new(&built.kernel, &built.filter)
                    .with_original_filter(filter)
                    .with_hash(hash)
                    .with_csc_params(built.csc_params)
                    .with_colorfill_cspace(built.colorfill_cspace);
                match cache.add_kernel(&build, &|kcid: i32| in_flight.contains(&kcid)) {
                    Ok(stored) => Some(stored.kcid()),
                    Err(error) => {
                        report.uncached_frames += 1;
                        debug!(%error, "frame rendered with an uncached kernel");
                        None
                    }
                }
            }
        };

        if let Some(kcid) = kcid
            && workload.pinned > 0
        {
            in_flight.push_back(kcid);
            if in_flight.len() > workload.pinned {
                in_flight.pop_front();
            }
        }
    }

    report.cache = cache.metrics();
    info!(hits = report.hits, misses = report.misses, "kernel cache replay finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload() -> WorkloadConfig {
        WorkloadConfig {
            frames: 500,
            distinct_filters: 40,
            layers: 3,
            pinned: 2,
            seed: 11,
        }
    }

    fn cache_config() -> KernelCacheConfig {
        KernelCacheConfig::default().with_max_combined_kernels(16)
    }

    #[test]
    fn generated_filters_are_distinct_and_end_with_the_target() {
        let mut rng = StdRng::seed_from_u64(3);
        let filters = generate_filters(&mut rng, 50, 4);
        assert_eq!(filters.len(), 50);
        let unique: FxHashSet<_> = filters.iter().collect();
        assert_eq!(unique.len(), 50);
        for filter in &filters {
            assert!((2..=5).contains(&filter.len()));
            assert_eq!(filter.last().and_then(FilterEntry::layer), Some(Layer::RenderTarget));
        }
    }

    #[test]
    fn replay_accounts_for_every_frame() {
        let report = run(&workload(), cache_config()).expect("replay succeeds");
        assert_eq!(report.hits + report.misses, 500);
        assert_eq!(report.kernels_built, report.misses);
        assert_eq!(report.cache.hits, report.hits);
        assert_eq!(report.cache.inserts + report.uncached_frames, report.kernels_built);
        assert!(report.cache.live <= 16);
        assert!(report.cache.evictions > 0, "40 filters cannot fit in 16 slots");
    }

    #[test]
    fn replay_is_deterministic_per_seed() {
        let first = run(&workload(), cache_config()).expect("replay succeeds");
        let second = run(&workload(), cache_config()).expect("replay succeeds");
        assert_eq!(first.hits, second.hits);
        assert_eq!(first.cache, second.cache);
    }

    #[test]
    fn report_serialises_to_json() {
        let report = run(&WorkloadConfig { frames: 20, ..workload() }, cache_config()).expect("replay succeeds");
        let json = serde_json::to_value(&report).expect("serialisable");
        assert_eq!(json["workload"]["frames"], 20);
        assert_eq!(json["cache"]["max_entries"], 16);
        assert!(report.to_string().starts_with("replayed 20 frames"));
    }
}
