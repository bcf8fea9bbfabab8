//! Benchmark suite for codec throughput
//!
//! This benchmark measures encoding and decoding of generated records with:
//! - The binary and extended JSON encodings
//! - Resolving reads against an evolved reader schema
//! - Decimal logical values
//!
//! # Configuration
//!
//! - `BENCH_SAMPLE_SIZE`: samples per benchmark (default: criterion's)
//! - `BENCH_RECORDS`: records per iteration (default: 1000)
//!
//! ```bash
//! BENCH_SAMPLE_SIZE=20 BENCH_RECORDS=20000 cargo bench
//! ```

use std::hint::black_box;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use avrokit::{
    parse_schema, AvroValue, BinaryDecoder, BinaryEncoder, DatumReader, DatumWriter,
    JsonDecoder, JsonEncoder, Schema,
};

const WRITER: &str = r#"{"type":"record","name":"Trade","namespace":"bench","fields":[
    {"name":"id","type":"long"},
    {"name":"symbol","type":"string"},
    {"name":"price","type":{"type":"bytes","logicalType":"decimal","precision":18,"scale":4}},
    {"name":"qty","type":"int"},
    {"name":"venue","type":["null","string"],"default":null},
    {"name":"tags","type":{"type":"array","items":"string"}}]}"#;

const READER: &str = r#"{"type":"record","name":"Trade","namespace":"bench","fields":[
    {"name":"qty","type":"long"},
    {"name":"id","type":"long"},
    {"name":"price","type":{"type":"bytes","logicalType":"decimal","precision":18,"scale":4}},
    {"name":"side","type":"string","default":"BUY"}]}"#;

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn configure_criterion() -> Criterion {
    match env_usize("BENCH_SAMPLE_SIZE") {
        Some(size) => Criterion::default().sample_size(size),
        None => Criterion::default(),
    }
}

fn record_count() -> usize {
    env_usize("BENCH_RECORDS").unwrap_or(1000)
}

fn trades(count: usize) -> Vec<AvroValue> {
    (0..count)
        .map(|i| {
            let price = BigDecimal::from_str(&format!("{}.{:04}", 100 + i % 900, i % 10_000))
                .unwrap_or_default();
            AvroValue::Record(vec![
                ("id".into(), AvroValue::Long(i as i64)),
                ("symbol".into(), AvroValue::String(format!("SYM{}", i % 50))),
                ("price".into(), AvroValue::Decimal(price)),
                ("qty".into(), AvroValue::Int((i % 1000) as i32)),
                (
                    "venue".into(),
                    if i % 3 == 0 {
                        AvroValue::Null
                    } else {
                        AvroValue::String("XNAS".into())
                    },
                ),
                (
                    "tags".into(),
                    AvroValue::Array(vec![AvroValue::String("a".into()); i % 4]),
                ),
            ])
        })
        .collect()
}

fn encode_binary(schema: &Schema, values: &[AvroValue]) -> Vec<u8> {
    let writer = DatumWriter::new(schema);
    let mut encoder = BinaryEncoder::new(schema);
    for value in values {
        writer.write(value, &mut encoder).unwrap();
    }
    encoder.into_bytes()
}

fn encode_json(schema: &Schema, values: &[AvroValue]) -> String {
    let writer = DatumWriter::new(schema);
    let mut encoder = JsonEncoder::new(schema);
    for value in values {
        writer.write(value, &mut encoder).unwrap();
    }
    encoder.into_string()
}

fn bench_encode(c: &mut Criterion) {
    let schema = parse_schema(WRITER).unwrap();
    let count = record_count();
    let values = trades(count);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(count as u64));
    group.bench_function(BenchmarkId::new("binary", count), |b| {
        b.iter(|| black_box(encode_binary(&schema, &values)))
    });
    group.bench_function(BenchmarkId::new("json", count), |b| {
        b.iter(|| black_box(encode_json(&schema, &values)))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let schema = parse_schema(WRITER).unwrap();
    let count = record_count();
    let values = trades(count);
    let bytes = encode_binary(&schema, &values);
    let text = encode_json(&schema, &values);
    let reader = DatumReader::new(&schema);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function(BenchmarkId::new("binary", count), |b| {
        b.iter(|| {
            let mut decoder = BinaryDecoder::new(&bytes, &schema);
            for _ in 0..count {
                black_box(reader.read(&mut decoder).unwrap());
            }
        })
    });
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function(BenchmarkId::new("json", count), |b| {
        b.iter(|| {
            let mut decoder = JsonDecoder::new(&text, &schema).unwrap();
            for _ in 0..count {
                black_box(reader.read(&mut decoder).unwrap());
            }
        })
    });
    group.finish();
}

fn bench_resolving(c: &mut Criterion) {
    let writer = parse_schema(WRITER).unwrap();
    let reader_schema = parse_schema(READER).unwrap();
    let count = record_count();
    let values = trades(count);
    let bytes = encode_binary(&writer, &values);
    let reader = DatumReader::new(&reader_schema);

    let mut group = c.benchmark_group("resolving");
    group.throughput(Throughput::Elements(count as u64));
    group.bench_function(BenchmarkId::new("binary", count), |b| {
        b.iter(|| {
            let mut decoder = BinaryDecoder::resolving(&bytes, &writer, &reader_schema);
            for _ in 0..count {
                black_box(reader.read(&mut decoder).unwrap());
            }
        })
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_encode, bench_decode, bench_resolving
}

criterion_main!(benches);
