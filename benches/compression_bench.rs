use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use c_zip::codec::deflate::{DeflateCodec, Deflater, Inflater};
use c_zip::codec::{encode_to_vec, Decoder, Encoder, Flush};
use c_zip::{Archive, Method, OpenFlags};

fn generate_compressible_data(size: usize) -> Vec<u8> {
    // Pattern that compresses well
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_random_data(size: usize) -> Vec<u8> {
    // Pseudo-random data that doesn't compress well
    let mut data = Vec::with_capacity(size);
    let mut state = 0x12345678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

fn bench_deflate_codec(c: &mut Criterion) {
    let sizes = vec![1024, 64 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("deflate_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        for (label, data) in [
            ("compressible", generate_compressible_data(size)),
            ("random", generate_random_data(size)),
        ] {
            group.bench_with_input(BenchmarkId::new("encode", label), &data, |b, data| {
                b.iter(|| {
                    let mut enc = Deflater::new(6, 15).unwrap();
                    let mut out = vec![0u8; data.len() * 2 + 64];
                    enc.process(black_box(data), &mut out, Flush::Finish).unwrap()
                });
            });

            let stream = encode_to_vec(&DeflateCodec::default(), 6, &data).unwrap();
            group.bench_with_input(BenchmarkId::new("decode", label), &stream, |b, stream| {
                b.iter(|| {
                    let mut dec = Inflater::new(-15).unwrap();
                    let mut out = vec![0u8; size + 16];
                    dec.process(black_box(stream), &mut out, Flush::Finish).unwrap()
                });
            });
        }
        group.finish();
    }
}

fn bench_archive_write(c: &mut Criterion) {
    let size = 1024 * 1024;
    let data = generate_compressible_data(size);

    let mut group = c.benchmark_group("archive_write_1MB");
    group.throughput(Throughput::Bytes(size as u64));
    for method in [Method::Store, Method::Deflate] {
        group.bench_with_input(
            BenchmarkId::new("add_entry", method.token()),
            &data,
            |b, data| {
                b.iter(|| {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("bench.zip");
                    let mut archive = Archive::open(&path, OpenFlags::create()).unwrap();
                    archive.add("test.bin", black_box(data.as_slice()), Some(method)).unwrap();
                    archive.close().unwrap();
                });
            },
        );
    }
    group.finish();
}

fn format_size(size: usize) -> String {
    if size >= 1024 * 1024 {
        format!("{}MB", size / (1024 * 1024))
    } else {
        format!("{}KB", size / 1024)
    }
}

criterion_group!(benches, bench_deflate_codec, bench_archive_write);
criterion_main!(benches);
