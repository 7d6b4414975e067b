use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pairmap::{Lookup, MapConfig, PairMap, hash};
use std::collections::HashMap;

fn scan() -> MapConfig {
    MapConfig::new()
}

fn indexed() -> MapConfig {
    MapConfig::new().lookup(Lookup::Indexed)
}

fn bench_insert(c: &mut Criterion) {
    for n in [8usize, 64] {
        let mut group = c.benchmark_group(format!("HashMap vs PairMap (Insert {n})"));
        group.bench_function("std::collections::HashMap", |b| {
            b.iter(|| {
                let mut m = HashMap::new();
                for i in 0..n {
                    m.insert(black_box(i as u32), black_box(i as u32));
                }
                m
            })
        });

        group.bench_function("PairMap<u32, u32> (scan)", |b| {
            b.iter(|| {
                let mut m: PairMap<u32, u32> = PairMap::with_config(scan());
                for i in 0..n {
                    m.set(black_box(i as u32), black_box(i as u32)).unwrap();
                }
                m
            })
        });

        group.bench_function("PairMap<u32, u32> (indexed)", |b| {
            b.iter(|| {
                let mut m: PairMap<u32, u32> = PairMap::with_config(indexed());
                for i in 0..n {
                    m.set(black_box(i as u32), black_box(i as u32)).unwrap();
                }
                m
            })
        });
        group.finish();
    }
}

fn bench_get(c: &mut Criterion) {
    for n in [8usize, 64] {
        let mut group = c.benchmark_group(format!("HashMap vs PairMap (Get {n})"));
        let mut m_std = HashMap::new();
        let mut m_scan: PairMap<u32, u32> = PairMap::with_config(scan());
        let mut m_indexed: PairMap<u32, u32> = PairMap::with_config(indexed());
        for i in 0..n {
            m_std.insert(i as u32, i as u32);
            m_scan.set(i as u32, i as u32).unwrap();
            m_indexed.set(i as u32, i as u32).unwrap();
        }

        group.bench_function("std::collections::HashMap", |b| {
            b.iter(|| {
                for i in 0..n {
                    black_box(m_std.get(&black_box(i as u32)));
                }
            })
        });

        group.bench_function("PairMap<u32, u32> (scan)", |b| {
            b.iter(|| {
                for i in 0..n {
                    black_box(m_scan.get(&black_box(i as u32)));
                }
            })
        });

        group.bench_function("PairMap<u32, u32> (indexed)", |b| {
            b.iter(|| {
                for i in 0..n {
                    black_box(m_indexed.get(&black_box(i as u32)));
                }
            })
        });
        group.finish();
    }
}

fn bench_erase_front(c: &mut Criterion) {
    let mut group = c.benchmark_group("PairMap erase (front of 64, compaction)");
    let n = 64u32;

    group.bench_function("scan", |b| {
        b.iter_batched(
            || (0..n).map(|i| (i, i)).collect::<PairMap<u32, u32>>(),
            |mut m| {
                for i in 0..n {
                    black_box(m.erase(&black_box(i)));
                }
                m
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_hash_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("Byte hash (16 bytes)");
    let bytes = [0x5Au8; 16];
    group.bench_function("djb2", |b| b.iter(|| hash::djb2(black_box(&bytes))));
    group.bench_function("fnv1a", |b| b.iter(|| hash::fnv1a(black_box(&bytes))));
    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_get,
    bench_erase_front,
    bench_hash_functions
);
criterion_main!(benches);
