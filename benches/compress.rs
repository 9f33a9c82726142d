use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use lzmacodec::{Coder, LzmaEncoder, LzmaOptions, MatchFinderKind};

fn criterion_benchmark(c: &mut Criterion) {
    let data_part = include_bytes!("../src/compressors/lzma/codecs/lzma_stream_codec.rs");

    let mut data = Vec::new();
    for _ in 0..100 {
        data.extend_from_slice(data_part);
    }

    let mut c = c.benchmark_group("compress");
    c.measurement_time(Duration::from_secs(30));
    c.throughput(Throughput::Bytes(data.len() as u64));

    let variants = [
        ("fast bt4", 0, MatchFinderKind::BT4),
        ("normal bt4", 2, MatchFinderKind::BT4),
        ("normal bt2", 2, MatchFinderKind::BT2),
    ];

    for (name, algorithm, match_finder) in variants {
        let options = LzmaOptions::default()
            .with_dict_bits(16)
            .with_algorithm(algorithm)
            .with_match_finder(match_finder);

        c.bench_function(name, |b| {
            b.iter(|| {
                let mut compressed = Vec::new();
                let mut encoder = LzmaEncoder::new(options.clone()).unwrap();
                encoder
                    .code(&data[..], &mut compressed, Some(data.len() as u64), None, None)
                    .unwrap();
                black_box(compressed)
            })
        });
    }
    c.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
