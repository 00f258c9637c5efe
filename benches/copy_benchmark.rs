//! Performance benchmarks for Stagehand
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stagehand::backend::{Backend, LocalBackend};
use stagehand::copy::{ResilientCopier, RetryPolicy};
use stagehand::hash;
use std::fs::File;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

/// Create a test file of the specified size
fn create_test_file(dir: &std::path::Path, name: &str, size: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();

    let chunk_size = 64 * 1024;
    let chunk: Vec<u8> = (0..chunk_size).map(|i| (i % 256) as u8).collect();
    let mut remaining = size;

    while remaining > 0 {
        let to_write = remaining.min(chunk_size);
        file.write_all(&chunk[..to_write]).unwrap();
        remaining -= to_write;
    }

    path
}

fn bench_local_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_copy");

    for size in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let src = create_test_file(src_dir.path(), "input.bin", size);
        let src_str = src.display().to_string();
        let dst_str = dst_dir.path().join("output.bin").display().to_string();
        let backend = LocalBackend::new();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| backend.copy(&src_str, &dst_str).unwrap());
        });
    }

    group.finish();
}

fn bench_resilient_copy(c: &mut Criterion) {
    let src_dir = TempDir::new().unwrap();
    let dst_dir = TempDir::new().unwrap();
    let size = 1024 * 1024;
    let src = create_test_file(src_dir.path(), "input.bin", size);
    let src_str = src.display().to_string();
    let dst_str = dst_dir.path().join("output.bin").display().to_string();

    let copier = ResilientCopier::with_policy(RetryPolicy {
        max_attempts: 3,
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    });

    let mut group = c.benchmark_group("resilient_copy");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("verified_1mb", |b| {
        b.iter(|| copier.copy(&src_str, &dst_str).unwrap());
    });
    group.finish();
}

fn bench_hash_file(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let size = 16 * 1024 * 1024;
    let path = create_test_file(dir.path(), "hashed.bin", size);

    let mut group = c.benchmark_group("hash");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("sha256_16mb", |b| {
        b.iter(|| hash::hash_file(&path).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_local_copy,
    bench_resilient_copy,
    bench_hash_file
);
criterion_main!(benches);
