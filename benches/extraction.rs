use std::fs::File;
use std::hint::black_box;
use std::io::Write;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use shardprep::{ShardId, ShardReader, ShardResult, ShardTask};

fn build_text() -> String {
    let mut text = String::with_capacity(4 << 20);
    let mut line = 0usize;
    while text.len() < 4 << 20 {
        text.push_str(&format!(
            "document {line}: the quick brown fox jumps over the lazy dog — ½ ünïcödé 🦀\n"
        ));
        line += 1;
    }
    text
}

fn bench_extraction(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = build_text();
    let mut encoder = xz2::write::XzEncoder::new(
        File::create(dir.path().join("bench.xz")).expect("create shard"),
        6,
    );
    encoder.write_all(text.as_bytes()).expect("encode");
    encoder.finish().expect("finish");

    let shard = ShardId::new("bench.xz").expect("recognised suffix");
    let task = ShardTask::new(shard, dir.path(), dir.path().join("bench.txt"));

    let mut group = c.benchmark_group("extract_xz_shard");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);
    for chunk_size in [64 * 1024, 1024 * 1024] {
        let reader = ShardReader::new(chunk_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &reader,
            |b, reader| {
                b.iter(|| {
                    let result = reader.read(&task);
                    assert!(matches!(result, ShardResult::Success { .. }));
                    black_box(result)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_extraction);
criterion_main!(benches);
