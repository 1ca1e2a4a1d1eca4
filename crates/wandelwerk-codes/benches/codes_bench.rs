// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for QR and barcode generation and QR decoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use wandelwerk_codes::{BarcodeFormat, BarcodeGenerator, BarcodeOptions, QrDecoder, QrEncoder, QrOptions};
use wandelwerk_core::OutputFormat;

const URL: &str = "https://example.org/products/4006381333931?ref=bench";

fn bench_qr_png(c: &mut Criterion) {
    let encoder = QrEncoder::new(QrOptions::with_size(400));
    c.bench_function("qr encode png (400px)", |b| {
        b.iter(|| black_box(encoder.encode(black_box(URL)).ok()));
    });
}

fn bench_qr_svg(c: &mut Criterion) {
    let encoder = QrEncoder::new(QrOptions::default().with_format(OutputFormat::Svg));
    c.bench_function("qr encode svg", |b| {
        b.iter(|| black_box(encoder.encode(black_box(URL)).ok()));
    });
}

fn bench_qr_decode(c: &mut Criterion) {
    let png = QrEncoder::new(QrOptions::with_size(400))
        .encode(URL)
        .map(|blob| blob.bytes)
        .unwrap_or_default();
    let decoder = QrDecoder::new();
    c.bench_function("qr decode (400px)", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&png)).ok()));
    });
}

fn bench_ean13(c: &mut Criterion) {
    let generator = BarcodeGenerator::new(BarcodeOptions::default());
    c.bench_function("ean13 png with caption", |b| {
        b.iter(|| black_box(generator.generate(BarcodeFormat::Ean13, "4006381333931").ok()));
    });
}

criterion_group!(benches, bench_qr_png, bench_qr_svg, bench_qr_decode, bench_ean13);
criterion_main!(benches);
