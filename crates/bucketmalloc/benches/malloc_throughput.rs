use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

const OPS: u64 = 100_000;

/// bucketmalloc alloc/free throughput.
fn bucketmalloc_malloc_free(size: usize) {
    unsafe {
        let a = bucketmalloc::init::allocator();
        for _ in 0..OPS {
            let ptr = a.malloc(size);
            black_box(ptr);
            a.free(ptr);
        }
    }
}

/// libc alloc/free throughput.
fn libc_malloc_free(size: usize) {
    for _ in 0..OPS {
        unsafe {
            let ptr = libc::malloc(size);
            black_box(ptr);
            libc::free(ptr);
        }
    }
}

fn benchmark_malloc_throughput(c: &mut Criterion) {
    unsafe {
        bucketmalloc::init::ensure_initialized();
    }

    let mut group = c.benchmark_group("malloc_throughput");

    for size in [16, 64, 256, 1024, 4096, 16384] {
        group.throughput(Throughput::Elements(OPS));

        group.bench_with_input(BenchmarkId::new("bucketmalloc", size), &size, |b, &size| {
            b.iter(|| bucketmalloc_malloc_free(size))
        });

        group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &size| {
            b.iter(|| libc_malloc_free(size))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_malloc_throughput);
criterion_main!(benches);
