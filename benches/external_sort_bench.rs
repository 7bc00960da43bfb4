use aro::stream::sort::{ExternalSort, ExternalSortOptions};
use aro::stream::{from_iter, Stream};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn shuffled(n: usize) -> Vec<i64> {
    // A deterministic, non-random permutation — avoids `Math.random()`
    // style nondeterminism so the benchmark is reproducible run to run.
    let mut v: Vec<i64> = (0..n as i64).collect();
    let (mut i, mut j) = (0usize, n - 1);
    while i < j {
        v.swap(i, j);
        i += 7;
        j = j.saturating_sub(11);
    }
    v
}

fn bench_external_sort_small_chunks(c: &mut Criterion) {
    let data = shuffled(10_000);
    c.bench_function("external_sort/10k_elements_chunk_256", |b| {
        b.iter(|| {
            let sort = ExternalSort::build(
                from_iter(black_box(data.clone())),
                ExternalSortOptions { chunk_size: 256 },
            )
            .unwrap();
            let sorted = sort.collect().unwrap();
            black_box(sorted.len());
        });
    });
}

fn bench_external_sort_large_chunks(c: &mut Criterion) {
    let data = shuffled(10_000);
    c.bench_function("external_sort/10k_elements_chunk_4096", |b| {
        b.iter(|| {
            let sort = ExternalSort::build(
                from_iter(black_box(data.clone())),
                ExternalSortOptions { chunk_size: 4096 },
            )
            .unwrap();
            let sorted = sort.collect().unwrap();
            black_box(sorted.len());
        });
    });
}

criterion_group!(benches, bench_external_sort_small_chunks, bench_external_sort_large_chunks);
criterion_main!(benches);
