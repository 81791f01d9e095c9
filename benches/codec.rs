//! 청크 코덱/분할/조립 벤치마크

use std::time::{Duration, Instant};

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use lms::{Chunk, MessageAssembler, MessageId, MessageSplitter, RawRecord};

const PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB
const SEGMENT_SIZE: usize = 16 * 1024; // 16KB

fn payload() -> Vec<u8> {
    (0..PAYLOAD_SIZE).map(|i| (i % 251) as u8).collect()
}

fn bench_encode(c: &mut Criterion) {
    let chunk = Chunk::new(
        MessageId::generate(),
        0,
        1,
        Bytes::from(vec![0xABu8; SEGMENT_SIZE]),
    );

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(SEGMENT_SIZE as u64));
    group.bench_function("encode_16k", |b| {
        b.iter(|| black_box(chunk.to_bytes()));
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let chunk = Chunk::new(
        MessageId::generate(),
        0,
        1,
        Bytes::from(vec![0xABu8; SEGMENT_SIZE]),
    );
    let bytes = chunk.to_bytes();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(SEGMENT_SIZE as u64));
    group.bench_function("decode_16k", |b| {
        b.iter(|| black_box(Chunk::from_bytes(&bytes).unwrap()));
    });
    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let splitter = MessageSplitter::new(SEGMENT_SIZE).unwrap();
    let payload = payload();

    let mut group = c.benchmark_group("splitter");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));
    group.bench_function("split_1m", |b| {
        b.iter(|| black_box(splitter.split(&payload)));
    });
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let splitter = MessageSplitter::new(SEGMENT_SIZE).unwrap();
    let payload = payload();
    let wire: Vec<Vec<u8>> = splitter
        .split(&payload)
        .iter()
        .map(|chunk| chunk.to_bytes())
        .collect();

    let mut group = c.benchmark_group("assembler");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));
    group.bench_function("assemble_1m", |b| {
        b.iter(|| {
            let mut assembler =
                MessageAssembler::new(Duration::from_secs(60), 64 * 1024 * 1024);
            let now = Instant::now();
            let mut delivered = 0usize;

            for bytes in &wire {
                let record = RawRecord {
                    topic: "bench".into(),
                    key: None,
                    payload: Bytes::copy_from_slice(bytes),
                };
                if matches!(
                    assembler.route_at(record, now),
                    lms::RouteOutcome::Delivered(_)
                ) {
                    delivered += 1;
                }
            }
            black_box(delivered)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_split, bench_assemble);
criterion_main!(benches);
