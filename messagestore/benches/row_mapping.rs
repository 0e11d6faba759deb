//! Benchmarks for payload encoding and the read path's row mapping.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use messagestore::{codec, BatchSize, GetOptions, PutOptions, StreamName, WriteMessage};
use messagestore_memory::InMemorySession;
use serde_json::json;
use tokio::runtime::Runtime;

fn payload() -> serde_json::Value {
    json!({
        "cart_id": "3f0c2a8e",
        "sku": "ABC-123",
        "qty": 3,
        "price": { "amount": 1299, "currency": "EUR" },
        "tags": ["gift", "express"],
    })
}

/// Benchmark payload encoding and decoding
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let payload = payload();
    let wire = codec::encode_data(&payload);

    group.bench_function("encode_data", |b| {
        b.iter(|| black_box(codec::encode_data(black_box(&payload))));
    });

    group.bench_function("decode_data", |b| {
        b.iter(|| black_box(codec::decode_data(black_box(Some(wire.as_str()))).unwrap()));
    });

    group.finish();
}

/// Benchmark reading and mapping pages of messages
fn bench_read_mapping(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("read_mapping");

    for size in [10_u32, 100, 1000] {
        let session = InMemorySession::new();
        let stream = StreamName::try_new(format!("bench-{size}")).unwrap();
        rt.block_on(async {
            for _ in 0..size {
                messagestore::put(
                    &session,
                    &WriteMessage::new("Benchmarked", payload()),
                    &stream,
                    PutOptions::default(),
                )
                .await
                .unwrap();
            }
        });

        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("get", size), &size, |b, &size| {
            let options = GetOptions::new().with_batch_size(BatchSize::try_new(size).unwrap());
            b.to_async(&rt).iter(|| async {
                black_box(
                    messagestore::get(&session, &stream, options.clone())
                        .await
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

/// Benchmark single appends
fn bench_put(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let session = InMemorySession::new();
    let stream = StreamName::try_new("bench-put").unwrap();
    let message = WriteMessage::new("Benchmarked", payload());

    c.bench_function("put", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                messagestore::put(&session, &message, &stream, PutOptions::default())
                    .await
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_codec, bench_read_mapping, bench_put);
criterion_main!(benches);
