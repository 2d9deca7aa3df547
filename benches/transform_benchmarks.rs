//! Inverse transform performance benchmarks
//!
//! Benchmarks for the 2-D inverse transforms across block sizes and
//! transform type pairs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vp9dec::tables::{TxSize, TxType};
use vp9dec::transform::inverse_transform_2d;

/// Fill a coefficient block with a deterministic mid-range pattern
fn test_coefficients(size: usize) -> Vec<i32> {
    (0..size * size)
        .map(|i| ((i as i32 * 31 + 17) % 512) - 256)
        .collect()
}

fn bench_idct(c: &mut Criterion) {
    let mut group = c.benchmark_group("idct");

    for &tx_size in &[TxSize::Tx4x4, TxSize::Tx8x8, TxSize::Tx16x16, TxSize::Tx32x32] {
        let size = tx_size.size();
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size}x{size}")),
            &tx_size,
            |b, &tx_size| {
                let coefficients = test_coefficients(tx_size.size());
                b.iter(|| {
                    let mut data = coefficients.clone();
                    inverse_transform_2d(
                        black_box(&mut data),
                        tx_size,
                        TxType::DctDct,
                        false,
                    )
                    .unwrap();
                    data
                });
            },
        );
    }
    group.finish();
}

fn bench_adst(c: &mut Criterion) {
    let mut group = c.benchmark_group("adst");

    // ADST pairs are only coded for 4x4 through 16x16.
    for &(tx_size, tx_type, name) in &[
        (TxSize::Tx4x4, TxType::AdstAdst, "4x4_adst_adst"),
        (TxSize::Tx8x8, TxType::AdstDct, "8x8_adst_dct"),
        (TxSize::Tx16x16, TxType::DctAdst, "16x16_dct_adst"),
    ] {
        let size = tx_size.size();
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &tx_size, |b, &tx_size| {
            let coefficients = test_coefficients(tx_size.size());
            b.iter(|| {
                let mut data = coefficients.clone();
                inverse_transform_2d(black_box(&mut data), tx_size, tx_type, false).unwrap();
                data
            });
        });
    }
    group.finish();
}

fn bench_wht(c: &mut Criterion) {
    c.bench_function("wht_4x4_lossless", |b| {
        let coefficients = test_coefficients(4);
        b.iter(|| {
            let mut data = coefficients.clone();
            inverse_transform_2d(black_box(&mut data), TxSize::Tx4x4, TxType::DctDct, true)
                .unwrap();
            data
        });
    });
}

criterion_group!(benches, bench_idct, bench_adst, bench_wht);
criterion_main!(benches);
