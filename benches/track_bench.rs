//! Throughput of `Kernel::write`/`read` across a range of payload sizes,
//! relative to the default 4 KiB chunk size.

use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;
use trackstore::{Kernel, KernelOptions};

fn open_kernel(dir: &std::path::Path) -> Kernel {
    Kernel::open(KernelOptions::new(dir)).unwrap()
}

fn write_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_write");
    for &size in &[256usize, 4096, 65536, 1 << 20] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let dir = tempdir().unwrap();
            let data = vec![0xABu8; size];
            let mut i = 0u64;
            b.iter(|| {
                let mut k = open_kernel(dir.path());
                let name = format!("obj-{i}");
                i += 1;
                k.write(name.as_bytes(), &mut Cursor::new(data.clone())).unwrap();
            });
        });
    }
    group.finish();
}

fn read_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_read");
    for &size in &[256usize, 4096, 65536, 1 << 20] {
        let dir = tempdir().unwrap();
        let mut k = open_kernel(dir.path());
        let data = vec![0xCDu8; size];
        k.write(b"fixture", &mut Cursor::new(data)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut out = Vec::new();
                k.read(b"fixture", &mut out).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, write_throughput, read_throughput);
criterion_main!(benches);
