//! Cross-validation of the in-tree DEFLATE codec against flate2
//! (canonical zlib) in both directions, including the wrapper
//! formats.

use std::io::{Read, Write};

use c_zip::codec::deflate::{DeflateCodec, Deflater, Inflater};
use c_zip::codec::{encode_to_vec, Decoder, Encoder, Flush, StreamStatus};

fn our_deflate(data: &[u8], level: i32) -> Vec<u8> {
    let mut encoder = Deflater::new(level, 15).unwrap();
    let mut out = vec![0u8; data.len() * 2 + 64];
    let progress = encoder.process(data, &mut out, Flush::Finish).unwrap();
    assert_eq!(progress.status, StreamStatus::End);
    out.truncate(progress.produced);
    out
}

fn our_inflate(stream: &[u8], window_bits: i32, cap: usize) -> Vec<u8> {
    let mut decoder = Inflater::new(window_bits).unwrap();
    let mut out = vec![0u8; cap];
    let progress = decoder.process(stream, &mut out, Flush::Finish).unwrap();
    assert_eq!(progress.status, StreamStatus::End);
    out.truncate(progress.produced);
    out
}

fn flate2_inflate(stream: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::DeflateDecoder::new(stream);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

fn sample_corpus() -> Vec<Vec<u8>> {
    let mut corpus = vec![
        Vec::new(),
        b"a".to_vec(),
        b"Hello, World!\n".to_vec(),
        b"The quick brown fox jumps over the lazy dog.".to_vec(),
        vec![b'A'; 1000],
        vec![0u8; 65536],
    ];
    // Mixed text with long-range repetition
    let mut mixed = Vec::new();
    for i in 0..500u32 {
        mixed.extend_from_slice(format!("line {i}: the same prefix again and again\n").as_bytes());
    }
    corpus.push(mixed);
    // Pseudo-random bytes (mostly incompressible)
    let mut noisy = Vec::with_capacity(10_000);
    let mut state = 0x12345678u32;
    for _ in 0..10_000 {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        noisy.push((state >> 24) as u8);
    }
    corpus.push(noisy);
    corpus
}

#[test]
fn flate2_decodes_everything_we_emit() {
    for data in sample_corpus() {
        for level in [0, 1, 3, 6, 9] {
            let stream = our_deflate(&data, level);
            assert!(!stream.is_empty());
            assert_eq!(flate2_inflate(&stream), data, "level {level}");
        }
    }
}

#[test]
fn we_decode_everything_flate2_emits() {
    for data in sample_corpus() {
        for level in [1, 6, 9] {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder.write_all(&data).unwrap();
            let stream = encoder.finish().unwrap();
            assert_eq!(
                our_inflate(&stream, -15, data.len() + 16),
                data,
                "level {level}"
            );
        }
    }
}

#[test]
fn we_decode_flate2_zlib_streams() {
    let data = b"zlib wrapped payload, for the standalone decoder".repeat(20);
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&data).unwrap();
    let stream = encoder.finish().unwrap();

    // Explicit zlib mode and auto-detection
    assert_eq!(our_inflate(&stream, 15, data.len() + 16), data);
    assert_eq!(our_inflate(&stream, 47, data.len() + 16), data);
}

#[test]
fn we_decode_flate2_gzip_streams() {
    let data = b"gzip wrapped payload, for the gunzip path".repeat(25);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&data).unwrap();
    let stream = encoder.finish().unwrap();

    assert_eq!(our_inflate(&stream, 31, data.len() + 16), data);
    assert_eq!(our_inflate(&stream, 47, data.len() + 16), data);
}

#[test]
fn flate2_best_compression_exercises_dynamic_blocks() {
    // Text this size makes zlib choose dynamic Huffman tables.
    let data = b"dynamic huffman block exercise, with enough entropy spread ".repeat(200);
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(&data).unwrap();
    let stream = encoder.finish().unwrap();
    assert!(stream.len() < data.len());
    assert_eq!(our_inflate(&stream, -15, data.len() + 16), data);
}

#[test]
fn encode_to_vec_agrees_with_direct_sessions() {
    let data = vec![b'x'; 4096];
    let via_driver = encode_to_vec(&DeflateCodec::default(), 6, &data).unwrap();
    assert_eq!(flate2_inflate(&via_driver), data);
}

#[test]
fn round_trip_survives_tiny_output_windows_both_ways() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 97) as u8).collect();

    // Encode through an 11-byte bottleneck.
    let mut encoder = Deflater::new(6, 15).unwrap();
    let mut stream = Vec::new();
    let mut chunk = [0u8; 11];
    let mut consumed = 0;
    loop {
        let p = encoder
            .process(&data[consumed..], &mut chunk, Flush::Finish)
            .unwrap();
        consumed += p.consumed;
        stream.extend_from_slice(&chunk[..p.produced]);
        if p.status == StreamStatus::End {
            break;
        }
    }
    assert_eq!(consumed, data.len());

    // Decode through a 7-byte bottleneck.
    let mut decoder = Inflater::new(-15).unwrap();
    let mut out = Vec::new();
    let mut chunk = [0u8; 7];
    let mut consumed = 0;
    loop {
        let p = decoder
            .process(&stream[consumed..], &mut chunk, Flush::Finish)
            .unwrap();
        consumed += p.consumed;
        out.extend_from_slice(&chunk[..p.produced]);
        if p.status == StreamStatus::End {
            break;
        }
    }
    assert_eq!(out, data);

    // And flate2 agrees the stream was well formed all along.
    assert_eq!(flate2_inflate(&stream), data);
}
