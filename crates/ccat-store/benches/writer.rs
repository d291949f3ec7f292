//! Writer and reader throughput.
//!
//! Run with: cargo bench -p ccat-store --bench writer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ccat_store::{Reader, Writer};

fn asset_paths(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Assets/Levels/level-{}/Props/prop-{i}.prefab", i % 16))
        .collect()
}

fn bench_write_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_values");
    for count in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("distinct", count), &count, |b, &count| {
            b.iter(|| {
                let mut writer = Writer::default();
                for v in 0..count {
                    black_box(writer.write(&v).unwrap());
                }
                writer.into_bytes()
            })
        });
        group.bench_with_input(BenchmarkId::new("repeated", count), &count, |b, &count| {
            b.iter(|| {
                let mut writer = Writer::default();
                for v in 0..count {
                    black_box(writer.write(&(v % 8)).unwrap());
                }
                writer.into_bytes()
            })
        });
    }
    group.finish();
}

fn bench_write_strings(c: &mut Criterion) {
    let paths = asset_paths(5_000);
    let mut group = c.benchmark_group("write_strings");
    group.throughput(Throughput::Elements(paths.len() as u64));
    for (name, separator) in [("literal", None), ("prefixed", Some('/'))] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut writer = Writer::default();
                for path in &paths {
                    black_box(writer.write_string(Some(path), separator).unwrap());
                }
                writer.into_bytes()
            })
        });
    }
    group.finish();
}

fn bench_read_strings(c: &mut Criterion) {
    let paths = asset_paths(5_000);
    let mut writer = Writer::default();
    let ids: Vec<_> = paths
        .iter()
        .map(|p| writer.write_string(Some(p), Some('/')).unwrap())
        .collect();
    let bytes = writer.into_bytes();

    let mut group = c.benchmark_group("read_strings");
    group.throughput(Throughput::Elements(ids.len() as u64));
    for capacity in [0u64, 8_192] {
        let reader = Reader::without_adapters(bytes.clone(), capacity);
        group.bench_with_input(BenchmarkId::new("cache", capacity), &reader, |b, reader| {
            b.iter(|| {
                for &id in &ids {
                    black_box(reader.read_string(id, Some('/')).unwrap());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write_values, bench_write_strings, bench_read_strings);
criterion_main!(benches);
