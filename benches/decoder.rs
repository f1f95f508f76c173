//! Benchmark suite for the notification and battery decoders.
//!
//! Both run once per sensor per cycle, so this mostly guards against
//! accidental quadratic behaviour in the hex parsing.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use mijia_exporter::decoder::{encode_battery, encode_notification};
use mijia_exporter::{decode_battery, decode_temperature_humidity};

const FRAME: &str =
    "Notification handle = 0x000e value: 54 3d 32 38 2e 33 20 48 3d 35 34 2e 31 00";

fn bench_temperature_humidity(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_temperature_humidity");
    group.throughput(Throughput::Elements(1));

    group.bench_function("gatttool_frame", |b| {
        b.iter(|| black_box(decode_temperature_humidity(black_box(FRAME))))
    });

    let negative = encode_notification(0x000e, b"T=-12.5 H=100.0\0");
    group.bench_function("negative_temperature", |b| {
        b.iter(|| black_box(decode_temperature_humidity(black_box(&negative))))
    });

    group.bench_function("malformed", |b| {
        b.iter(|| black_box(decode_temperature_humidity(black_box("Notification handle = 0x000e value: 54 3d zz"))))
    });

    group.finish();
}

fn bench_battery(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_battery");
    group.throughput(Throughput::Elements(1));

    let frame = encode_battery(0x3c);
    group.bench_function("gatttool_frame", |b| {
        b.iter(|| black_box(decode_battery(black_box(&frame))))
    });
    group.bench_function("bare_token", |b| {
        b.iter(|| black_box(decode_battery(black_box("40"))))
    });

    group.finish();
}

criterion_group!(benches, bench_temperature_humidity, bench_battery);
criterion_main!(benches);
