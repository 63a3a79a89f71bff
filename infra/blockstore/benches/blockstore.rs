use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use stx_blockstore::{BlockStore, Compression};
use tempfile::TempDir;

// ============================================================================
// Benchmark: Append Throughput
// ============================================================================

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    let rt = tokio::runtime::Runtime::new().unwrap();

    let sizes = [("1KB", 1024), ("64KB", 64 * 1024), ("1MB", 1024 * 1024)];

    for (name, size) in sizes {
        let payload: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        let throughput = u64::try_from(size).unwrap_or(u64::MAX);
        group.throughput(Throughput::Bytes(throughput));

        for compression in [Compression::None, Compression::Lz4] {
            let label = format!("{name}/{compression:?}");
            group.bench_with_input(BenchmarkId::new("append", label), &payload, |b, payload| {
                let temp = TempDir::new().unwrap();
                let store = rt.block_on(async {
                    BlockStore::builder()
                        .root(temp.path())
                        .compression(compression)
                        .connect()
                        .await
                        .unwrap()
                });
                let mut num = 0u32;
                b.iter(|| {
                    num += 1;
                    rt.block_on(store.append(num, payload)).unwrap();
                });
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Cached vs Cold Reads
// ============================================================================

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let rt = tokio::runtime::Runtime::new().unwrap();

    let temp = TempDir::new().unwrap();
    let payload: Vec<u8> = (0..64 * 1024).map(|i| u8::try_from(i % 256).unwrap()).collect();
    let store = rt.block_on(async {
        let store = BlockStore::builder()
            .root(temp.path())
            .compression(Compression::Lz4)
            .cache_capacity(8)
            .connect()
            .await
            .unwrap();
        for num in 1..=64u32 {
            store.append(num, &payload).await.unwrap();
        }
        store
    });

    group.throughput(Throughput::Bytes(64 * 1024));

    group.bench_function("cached", |b| {
        rt.block_on(store.read(64)).unwrap();
        b.iter(|| {
            black_box(rt.block_on(store.read(64)).unwrap());
        });
    });

    group.bench_function("cold_sweep", |b| {
        let mut num = 0u32;
        b.iter(|| {
            num = num % 64 + 1;
            black_box(rt.block_on(store.read(num)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_read);
criterion_main!(benches);
