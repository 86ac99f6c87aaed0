//! Criterion benchmarks for CRC-32C.
//!
//! Run with:
//! ```bash
//! cargo bench --package pulsar-wire --bench checksum_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulsar_wire::{crc32c, Crc32c};

fn make_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Benchmarks one-shot checksums over buffers of increasing size.
fn bench_crc32c(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32c");
    for size in [16usize, 256, 4 * 1024, 64 * 1024, 1024 * 1024] {
        let data = make_data(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("bytes", size), &data, |b, data| {
            b.iter(|| crc32c(black_box(data)))
        });
    }
    group.finish();
}

/// Benchmarks the incremental hasher fed in 1500-byte pieces.
fn bench_crc32c_incremental(c: &mut Criterion) {
    let data = make_data(1024 * 1024);
    let mut group = c.benchmark_group("crc32c_incremental");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("1MiB_in_1500B_chunks", |b| {
        b.iter(|| {
            let mut hasher = Crc32c::new();
            for chunk in data.chunks(1500) {
                hasher.update(black_box(chunk));
            }
            hasher.finalize()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_crc32c, bench_crc32c_incremental);
criterion_main!(benches);
