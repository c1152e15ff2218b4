//! Measures the lookup fast path and insert/evict churn of the kernel cache.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kdll::{FilterEntry, Format, KernelBuild, KernelCache, KernelCacheConfig, Layer, NeverInFlight, filter_hash};

fn filter_for(id: usize) -> Vec<FilterEntry> {
    vec![
        FilterEntry::new(Layer::MainVideo, Format::Nv12).with_procamp(id as i32),
        FilterEntry::new(Layer::RenderTarget, Format::A8R8G8B8),
    ]
}

fn populated_cache(entries: usize) -> (KernelCache, Vec<(Vec<FilterEntry>, u32)>) {
    let config = KernelCacheConfig::default().with_max_combined_kernels(entries.max(4));
    let mut cache = KernelCache::new(config).expect("valid config");
    let kernel = vec![0xa5u8; 4096];
    let filters: Vec<_> = (0..entries)
        .map(|id| {
            let filter = filter_for(id);
            let hash = filter_hash(&filter);
            cache
                .add_kernel(&KernelBuild::new(&kernel, &filter), &NeverInFlight)
                .expect("room");
            (filter, hash)
        })
        .collect();
    (cache, filters)
}

fn benchmark_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_cache_lookup");
    for entries in [16usize, 64, 256] {
        let (mut cache, filters) = populated_cache(entries);
        group.bench_with_input(BenchmarkId::new("hit", entries), &entries, |b, _| {
            let mut next = 0;
            b.iter(|| {
                let (filter, hash) = &filters[next % filters.len()];
                next += 1;
                black_box(cache.find_combined_kernel(filter, *hash).map(|k| k.size()))
            })
        });

        let missing = filter_for(entries + 1);
        let missing_hash = filter_hash(&missing);
        group.bench_with_input(BenchmarkId::new("miss", entries), &entries, |b, _| {
            b.iter(|| black_box(cache.find_combined_kernel(&missing, missing_hash).is_none()))
        });
    }
    group.finish();
}

fn benchmark_churn(c: &mut Criterion) {
    let (mut cache, _) = populated_cache(64);
    let kernel = vec![0x5au8; 8192];
    let mut next = 64;
    c.bench_function("kernel_cache_insert_evict", |b| {
        b.iter(|| {
            let filter = filter_for(next);
            next += 1;
            black_box(
                cache
                    .add_kernel(&KernelBuild::new(&kernel, &filter), &NeverInFlight)
                    .map(|k| k.kcid()),
            )
        })
    });
}

criterion_group!(benches, benchmark_lookup, benchmark_churn);
criterion_main!(benches);
