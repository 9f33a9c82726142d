use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use lzmacodec::{compress, decompress, Coder, LzmaDecoder, LzmaHeader, LzmaOptions};

fn criterion_benchmark(c: &mut Criterion) {
    let data_part = include_bytes!("../src/compressors/lzma/codecs/range_codec.rs");

    let mut data = Vec::new();
    for _ in 0..1000 {
        data.extend_from_slice(data_part);
    }

    let compressed = compress(&data, &LzmaOptions::default()).unwrap();

    let mut c = c.benchmark_group("decompress");
    c.measurement_time(Duration::from_secs(20));
    c.throughput(Throughput::Bytes(data.len() as u64));

    c.bench_function("whole image", |b| {
        b.iter(|| black_box(decompress(&compressed).unwrap()))
    });

    // Same stream into a preallocated output
    let mut output = Vec::with_capacity(data.len());
    c.bench_function("raw stream", |b| {
        b.iter(|| {
            let mut input = &compressed[..];
            let header = LzmaHeader::read_from(&mut input).unwrap();

            output.clear();
            LzmaDecoder::with_properties(header.properties)
                .code(input, &mut output, None, header.uncompressed_size, None)
                .unwrap();
            black_box(output.len())
        })
    });
    c.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
