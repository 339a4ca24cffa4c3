//! Interposer overhead over the C allocator.

use std::ffi::c_void;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tagshim_abi::{DirectAllocator, Interposer, TagIgnoring};
use tagshim_core::TagConfig;

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 10, 11, 64, 1024, 32768];
    let shim = Interposer::new(&DirectAllocator, TagIgnoring, TagConfig::DEFAULT);
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &sz| {
            b.iter(|| unsafe {
                let p = libc::malloc(sz);
                libc::free(criterion::black_box(p));
            });
        });
        group.bench_with_input(BenchmarkId::new("interposer", size), &size, |b, &sz| {
            b.iter(|| unsafe {
                let p = shim.malloc(sz);
                shim.free(criterion::black_box(p));
            });
        });
    }
    group.finish();
}

fn bench_calloc(c: &mut Criterion) {
    let shim = Interposer::new(&DirectAllocator, TagIgnoring, TagConfig::DEFAULT);
    let mut group = c.benchmark_group("calloc");

    for &(count, size) in &[(64usize, 4usize), (4, 64), (256, 16)] {
        let id = format!("{count}x{size}");
        group.bench_with_input(BenchmarkId::new("libc", &id), &(count, size), |b, &(n, s)| {
            b.iter(|| unsafe {
                let p = libc::calloc(n, s);
                libc::free(criterion::black_box(p));
            });
        });
        group.bench_with_input(
            BenchmarkId::new("interposer", &id),
            &(count, size),
            |b, &(n, s)| {
                b.iter(|| unsafe {
                    let p = shim.calloc(n, s);
                    shim.free(criterion::black_box(p));
                });
            },
        );
    }
    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    let shim = Interposer::new(&DirectAllocator, TagIgnoring, TagConfig::DEFAULT);
    let mut group = c.benchmark_group("realloc_growth");

    group.bench_function("libc/8->4096", |b| {
        b.iter(|| unsafe {
            let p: *mut c_void = libc::malloc(8);
            let q = libc::realloc(p, 4096);
            libc::free(criterion::black_box(q));
        });
    });
    group.bench_function("interposer/8->4096", |b| {
        b.iter(|| unsafe {
            let p = shim.malloc(8);
            let q = shim.realloc(p, 4096);
            shim.free(criterion::black_box(q));
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_calloc,
    bench_realloc_growth
);
criterion_main!(benches);
