//! Wire format benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use statejournal_core::format::varint::{put_varuint, read_varuint};
use statejournal_core::frame::{decode_frame, encode_frame};
use statejournal_core::object::{encode_diff, DiffChange, DiffPayloadReader};
use statejournal_core::{FrameTag, Value};

fn diff_entries(count: u64) -> Vec<(u64, DiffChange<Value>)> {
    (0..count)
        .map(|key| {
            let change = if key % 5 == 0 {
                DiffChange::Removed
            } else {
                DiffChange::Present(Value::Int(key as i64 * 31))
            };
            (key * 3, change)
        })
        .collect()
}

/// Benchmark varint encoding and decoding.
fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");

    for value in [1u64, 300, 1 << 35, u64::MAX].iter() {
        group.bench_with_input(BenchmarkId::new("encode", value), value, |b, &value| {
            let mut out = Vec::with_capacity(10);
            b.iter(|| {
                out.clear();
                put_varuint(&mut out, black_box(value));
            });
        });

        let mut encoded = Vec::new();
        put_varuint(&mut encoded, *value);
        group.bench_with_input(BenchmarkId::new("decode", value), &encoded, |b, encoded| {
            b.iter(|| black_box(read_varuint(black_box(encoded)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark diff payload encoding and decoding.
fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for count in [8u64, 128, 2048].iter() {
        let entries = diff_entries(*count);
        group.throughput(Throughput::Elements(*count));

        group.bench_with_input(BenchmarkId::new("encode", count), &entries, |b, entries| {
            let mut out = Vec::new();
            b.iter(|| {
                out.clear();
                encode_diff(black_box(entries), &mut out);
            });
        });

        let mut payload = Vec::new();
        encode_diff(&entries, &mut payload);
        group.bench_with_input(BenchmarkId::new("decode", count), &payload, |b, payload| {
            b.iter(|| {
                let reader = DiffPayloadReader::new(black_box(payload)).unwrap();
                black_box(reader.read_all::<Value>().unwrap())
            });
        });
    }
    group.finish();
}

/// Benchmark frame encoding and checksum validation.
fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [16usize, 256, 4096].iter() {
        let payload = vec![0x5Au8; *size];
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| black_box(encode_frame(FrameTag::DICT_VERSION, black_box(payload)).unwrap()));
        });

        let frame = encode_frame(FrameTag::DICT_VERSION, &payload).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| black_box(decode_frame(4, black_box(frame)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_varint, bench_diff, bench_frame);

criterion_main!(benches);
