//! End-to-end replay cost with and without enough cache capacity for the working set.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kdll::KernelCacheConfig;
use kdll_cli::replay::{SyntheticKernelBuilder, WorkloadConfig, generate_filters, run};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn benchmark_replay(c: &mut Criterion) {
    let workload = WorkloadConfig {
        frames: 2_000,
        distinct_filters: 96,
        layers: 3,
        pinned: 2,
        seed: 0x5eed,
    };

    let mut group = c.benchmark_group("kernel_cache_replay");
    for max_entries in [16usize, 64, 128] {
        let config = KernelCacheConfig::default().with_max_combined_kernels(max_entries);
        group.bench_with_input(BenchmarkId::from_parameter(max_entries), &config, |b, config| {
            b.iter(|| black_box(run(&workload, *config).map(|report| report.hits)))
        });
    }
    group.finish();
}

fn benchmark_build(c: &mut Criterion) {
    let builder = SyntheticKernelBuilder::new().expect("components register");
    let mut rng = StdRng::seed_from_u64(1);
    let filters = generate_filters(&mut rng, 32, 4);
    let mut next = 0;
    c.bench_function("synthetic_kernel_build", |b| {
        b.iter(|| {
            let filter = &filters[next % filters.len()];
            next += 1;
            black_box(builder.build(filter).map(|built| built.kernel.len()))
        })
    });
}

criterion_group!(benches, benchmark_replay, benchmark_build);
criterion_main!(benches);
