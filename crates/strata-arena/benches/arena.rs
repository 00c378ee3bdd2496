// Arena allocator benchmarks
//
// These benchmarks measure the bump allocation fast path, chunk growth,
// reset/reuse cycles, typed allocation and the cost of the mutex-guarded
// SafeArena compared to a plain Arena.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use strata_arena::{Arena, SafeArena};

/// Allocations per measured iteration. The arena is reset afterwards so
/// memory stays bounded across samples.
const BATCH: usize = 64;

/// Benchmark sequential allocations of different sizes.
///
/// Chunks are large enough that every batch is served from the current
/// chunk, so this measures the pure bump path.
fn bench_sequential_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_alloc");

    for size in [8usize, 16, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut arena = Arena::new(BATCH * 1024);
            b.iter(|| {
                for _ in 0..BATCH {
                    black_box(arena.alloc_bytes(black_box(size)).unwrap());
                }
                arena.reset().unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark mixed-size allocations, including padding to word alignment.
fn bench_mixed_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_alloc");

    group.bench_function("variable_sizes", |b| {
        let mut arena = Arena::new(0);
        let sizes = [3usize, 16, 61, 256, 1000];

        b.iter(|| {
            for i in 0..BATCH {
                black_box(arena.alloc_bytes(sizes[i % sizes.len()]).unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.finish();
}

/// Benchmark chunk growth.
///
/// Every iteration builds a fresh arena with small chunks and forces it
/// to grow repeatedly, so the host allocator is on the measured path.
fn bench_chunk_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_growth");
    group.sample_size(100);

    group.bench_function("small_chunks", |b| {
        b.iter(|| {
            let arena = Arena::new(1024);
            for _ in 0..100 {
                black_box(arena.alloc_bytes(black_box(64)).unwrap());
            }
            black_box(arena.num_chunks())
        });
    });

    group.bench_function("oversized_requests", |b| {
        b.iter(|| {
            let arena = Arena::new(1024);
            for _ in 0..16 {
                black_box(arena.alloc_bytes(black_box(4096)).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark reuse of retained chunks after a reset.
///
/// After the first iteration the arena owns enough chunks, so allocation
/// walks forward through them instead of growing.
fn bench_reset_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset_reuse");

    group.bench_function("walk_retained_chunks", |b| {
        let mut arena = Arena::new(1024);
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(arena.alloc_bytes(black_box(200)).unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.finish();
}

/// Benchmark typed allocation helpers.
fn bench_typed_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("typed_alloc");

    group.bench_function("alloc_zeroed_u64", |b| {
        let mut arena = Arena::new(0);
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(arena.alloc::<u64>().unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.bench_function("alloc_slice_zeroed_256", |b| {
        let mut arena = Arena::new(0);
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(arena.alloc_slice_zeroed::<u32>(256).unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.finish();
}

/// Benchmark plain arena vs mutex-guarded arena.
///
/// Single-threaded, so this measures the uncontended lock plus handle
/// construction.
fn bench_local_vs_safe(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_comparison");

    group.bench_function("arena", |b| {
        let mut arena = Arena::new(0);
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(arena.alloc_bytes(black_box(64)).unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.bench_function("safe_arena", |b| {
        let arena = SafeArena::new(0);
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(arena.alloc_bytes(black_box(64)).unwrap());
            }
            arena.reset().unwrap();
        });
    });

    group.finish();
}

/// Benchmark metrics collection.
///
/// Metrics walk every chunk, so the arena is pre-populated with several.
fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    let arena = Arena::new(1024);
    for _ in 0..32 {
        arena.alloc_bytes(1000).unwrap();
    }

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(arena.metrics()));
    });

    group.bench_function("size_in_use", |b| {
        b.iter(|| black_box(arena.size_in_use()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_allocations,
    bench_mixed_allocations,
    bench_chunk_growth,
    bench_reset_reuse,
    bench_typed_allocations,
    bench_local_vs_safe,
    bench_metrics,
);
criterion_main!(benches);
