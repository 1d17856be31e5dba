//! Чтение wideband при разном числе потоков.
//!
//! Запуск: cargo bench -p cphd-benchmark --bench wideband

use std::hint::black_box;

use cphd_benchmark::wideband_fixture;
use cphd_core::{CellView, CellVisitor, CphdReader, SampleCell};
use cphd_types::SampleType;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const VECTORS: usize = 2048;
const SAMPLES: usize = 1024;

struct Sum;

impl CellVisitor for Sum {
    type Output = f64;

    fn visit<T: SampleCell>(
        self,
        view: CellView<'_, T>,
    ) -> f64 {
        view.iter().map(|c| c.to_c64().re).sum()
    }
}

fn bench_full_channel(c: &mut Criterion) {
    let tmp = wideband_fixture(SampleType::ComplexInt16, VECTORS, SAMPLES).unwrap();
    let reader = CphdReader::open(tmp.path(), None).unwrap();

    let mut group = c.benchmark_group("full_channel");
    group.throughput(Throughput::Bytes((VECTORS * SAMPLES * 4) as u64));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                reader
                    .read_wideband(black_box(0), 0, None, 0, None, Some(w))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_strided_window(c: &mut Criterion) {
    let tmp = wideband_fixture(SampleType::ComplexInt16, VECTORS, SAMPLES).unwrap();
    let reader = CphdReader::open(tmp.path(), None).unwrap();

    // Окно в половину ширины: одна позиционная операция на строку
    let (first, last) = (SAMPLES / 4, SAMPLES * 3 / 4 - 1);

    let mut group = c.benchmark_group("strided_window");
    group.throughput(Throughput::Bytes((VECTORS * (last - first + 1) * 4) as u64));

    for workers in [1, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                reader
                    .read_wideband(0, 0, None, first, Some(last), Some(w))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_cell_traversal(c: &mut Criterion) {
    let tmp = wideband_fixture(SampleType::ComplexFloat32, 512, SAMPLES).unwrap();
    let reader = CphdReader::open(tmp.path(), Some(4)).unwrap();
    let block = reader.read_channel(0).unwrap();

    c.bench_function("traverse_cf8_cells", |b| {
        b.iter(|| {
            black_box(&block)
                .as_typed_cells(SampleType::ComplexFloat32)
                .unwrap()
                .visit(Sum)
        })
    });
}

criterion_group!(
    benches,
    bench_full_channel,
    bench_strided_window,
    bench_cell_traversal
);
criterion_main!(benches);
