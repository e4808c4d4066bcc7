//! The DEFLATE encoder: fixed-Huffman blocks over a hash-chain LZ77
//! matcher, or stored blocks at level 0.
//!
//! The hash chain is two flat arrays: `head` maps a 3-byte hash to the
//! most recent position it landed on, `prev` maps a window index to
//! the previous position with the same hash. Positions are stored
//! offset by +1 so 0 means "empty".

use crate::codec::deflate::{
    HuffmanTable, DEFAULT_LEVEL, DIST_BASE, DIST_EXTRA, EOB, LENGTH_BASE, LENGTH_EXTRA,
};
use crate::codec::{Encoder, Flush, StreamProgress, StreamStatus};
use crate::error::{Result, ZipError};

/// Longest match DEFLATE can express.
const MAX_MATCH: usize = 258;
/// Shortest match worth encoding.
const MIN_MATCH: usize = 3;
/// Output bytes a single symbol can need in the worst case, counting
/// buffered bits: 9-bit length code + 5 extra + 5-bit distance code +
/// 13 extra plus up to 7 carried bits.
const SYMBOL_SPACE: usize = 8;

/// A DEFLATE encoder session.
pub struct Deflater {
    level: i32,

    window: Vec<u8>,
    window_mask: usize,
    /// Most recent position per hash bucket, +1 (0 = empty).
    head: Vec<u32>,
    /// Previous position with the same hash per window slot, +1.
    prev: Vec<u32>,
    hash_shift: u32,
    hash_mask: usize,
    /// Absolute position of the next byte to enter the window.
    pos: usize,

    bit_buffer: u32,
    bits_in: u32,

    /// Set once the current block's header bits are out.
    header_written: bool,
    /// Final-block bit the current header carried.
    block_final: bool,
    finished: bool,

    literals: HuffmanTable,
    distances: HuffmanTable,
}

impl Deflater {
    /// Create an encoder. `level` 0 stores, 1..=9 compresses (higher
    /// levels search longer hash chains); negative means the default.
    /// `window_bits` sets the 2^w sliding window, 8..=15.
    pub fn new(level: i32, window_bits: u32) -> Result<Deflater> {
        if !(8..=15).contains(&window_bits) {
            return Err(ZipError::InvalidArgument("window bits must be 8..=15"));
        }
        let level = if level < 0 {
            DEFAULT_LEVEL
        } else {
            level.min(9)
        };
        let window_size = 1usize << window_bits;
        let hash_bits = window_bits - 3;
        let hash_size = 1usize << hash_bits;

        Ok(Deflater {
            level,
            window: vec![0u8; window_size],
            window_mask: window_size - 1,
            head: vec![0u32; hash_size],
            prev: vec![0u32; window_size],
            hash_shift: 32 - hash_bits,
            hash_mask: hash_size - 1,
            pos: 0,
            bit_buffer: 0,
            bits_in: 0,
            header_written: false,
            block_final: false,
            finished: false,
            literals: HuffmanTable::fixed_literals(),
            distances: HuffmanTable::fixed_distances(),
        })
    }

    /// Multiply-shift hash of three consecutive bytes.
    fn hash(&self, bytes: &[u8]) -> usize {
        let v = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
        (v.wrapping_mul(0x9e37_79b1) >> self.hash_shift) as usize & self.hash_mask
    }

    /// Record the current position in the hash chain, if three bytes
    /// of look-ahead exist.
    fn insert_hash(&mut self, input: &[u8], in_pos: usize) {
        if input.len() - in_pos < MIN_MATCH || self.pos >= (u32::MAX - 1) as usize {
            return;
        }
        let h = self.hash(&input[in_pos..in_pos + 3]);
        self.prev[self.pos & self.window_mask] = self.head[h];
        self.head[h] = self.pos as u32 + 1;
    }

    /// Consume one input byte into the sliding window.
    fn consume(&mut self, byte: u8) {
        self.window[self.pos & self.window_mask] = byte;
        self.pos += 1;
    }

    /// Chain-walk budget per level.
    fn max_chain(&self) -> u32 {
        if self.level >= 8 {
            4096
        } else if self.level >= 5 {
            512
        } else if self.level >= 3 {
            128
        } else {
            32
        }
    }

    /// Find the longest match for the bytes at `in_pos`, walking the
    /// hash chain. Returns (length, distance).
    fn longest_match(&self, input: &[u8], in_pos: usize) -> Option<(usize, usize)> {
        let remaining = input.len() - in_pos;
        if remaining < MIN_MATCH {
            return None;
        }
        let max_len = remaining.min(MAX_MATCH);
        let window_size = self.window.len();

        let h = self.hash(&input[in_pos..in_pos + 3]);
        let mut stored = self.head[h];
        let mut best_len = 0usize;
        let mut best_dist = 0usize;
        let mut budget = self.max_chain();

        while stored != 0 && budget > 0 {
            budget -= 1;
            let cand = (stored - 1) as usize;
            if cand >= self.pos {
                break; // stale alias from a wrapped chain slot
            }
            let dist = self.pos - cand;
            if dist > window_size {
                break; // candidates only get older from here
            }

            // Compare against the window for history, and against the
            // look-ahead itself where the match would overlap it.
            let mut len = 0usize;
            while len < max_len {
                let expected = if len < dist {
                    self.window[(cand + len) & self.window_mask]
                } else {
                    input[in_pos + len - dist]
                };
                if expected != input[in_pos + len] {
                    break;
                }
                len += 1;
            }
            if len >= MIN_MATCH && len > best_len {
                best_len = len;
                best_dist = dist;
                if len >= max_len {
                    break;
                }
            }

            let next = self.prev[cand & self.window_mask];
            if next == 0 || (next - 1) as usize >= cand {
                break;
            }
            stored = next;
        }

        if best_len >= MIN_MATCH {
            Some((best_len, best_dist))
        } else {
            None
        }
    }

    /// Queue `n` bits, LSB-first, draining whole bytes to the output.
    /// Callers reserve enough output space beforehand.
    fn put_bits(&mut self, output: &mut [u8], out_pos: &mut usize, bits: u32, n: u32) {
        self.bit_buffer |= bits << self.bits_in;
        self.bits_in += n;
        while self.bits_in >= 8 {
            output[*out_pos] = (self.bit_buffer & 0xff) as u8;
            *out_pos += 1;
            self.bit_buffer >>= 8;
            self.bits_in -= 8;
        }
    }

    /// Emit a Huffman code MSB-first.
    fn put_code(&mut self, output: &mut [u8], out_pos: &mut usize, code: u16, len: u8) {
        let reversed = reverse_bits(code, len);
        self.put_bits(output, out_pos, reversed as u32, len as u32);
    }

    /// Pad the bit buffer out to the next byte boundary.
    fn flush_bits(&mut self, output: &mut [u8], out_pos: &mut usize) {
        if self.bits_in > 0 {
            output[*out_pos] = (self.bit_buffer & 0xff) as u8;
            *out_pos += 1;
            self.bit_buffer = 0;
            self.bits_in = 0;
        }
    }

    fn emit_literal(&mut self, output: &mut [u8], out_pos: &mut usize, byte: u8) {
        let (code, len) = self.literals.code(byte as usize);
        self.put_code(output, out_pos, code, len);
    }

    /// Emit a (length, distance) pair with canonical base tables
    /// supplying the extra-bit values exactly.
    fn emit_match(&mut self, output: &mut [u8], out_pos: &mut usize, length: usize, distance: usize) {
        let lidx = LENGTH_BASE
            .iter()
            .rposition(|&base| base as usize <= length)
            .expect("length is at least 3");
        let (code, len) = self.literals.code(257 + lidx);
        self.put_code(output, out_pos, code, len);
        let lextra = LENGTH_EXTRA[lidx] as u32;
        if lextra > 0 {
            let value = (length - LENGTH_BASE[lidx] as usize) as u32;
            self.put_bits(output, out_pos, value, lextra);
        }

        let didx = DIST_BASE
            .iter()
            .rposition(|&base| base as usize <= distance)
            .expect("distance is at least 1");
        let (dcode, dlen) = self.distances.code(didx);
        self.put_code(output, out_pos, dcode, dlen);
        let dextra = DIST_EXTRA[didx] as u32;
        if dextra > 0 {
            let value = (distance - DIST_BASE[didx] as usize) as u32;
            self.put_bits(output, out_pos, value, dextra);
        }
    }

    /// Level 0: stored blocks, 65535 bytes at a time.
    fn process_stored(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> Result<StreamProgress> {
        let mut in_pos = 0usize;
        let mut out_pos = 0usize;
        loop {
            let remaining = input.len() - in_pos;
            if remaining == 0 && flush != Flush::Finish {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }
            let space = output.len() - out_pos;
            if space < 6 {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }
            let chunk = remaining.min(0xffff).min(space - 5);
            let last = flush == Flush::Finish && chunk == remaining;
            // Stored streams stay byte aligned, so the three header
            // bits plus padding are a whole byte.
            output[out_pos] = last as u8;
            let len = chunk as u16;
            output[out_pos + 1..out_pos + 3].copy_from_slice(&len.to_le_bytes());
            output[out_pos + 3..out_pos + 5].copy_from_slice(&(!len).to_le_bytes());
            out_pos += 5;
            output[out_pos..out_pos + chunk].copy_from_slice(&input[in_pos..in_pos + chunk]);
            for i in 0..chunk {
                self.consume(input[in_pos + i]);
            }
            in_pos += chunk;
            out_pos += chunk;
            if last {
                self.finished = true;
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::End,
                });
            }
        }
    }
}

impl Encoder for Deflater {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        if self.finished {
            return Ok(StreamProgress {
                consumed: 0,
                produced: 0,
                status: StreamStatus::End,
            });
        }
        if self.level == 0 {
            return self.process_stored(input, output, flush);
        }

        let mut in_pos = 0usize;
        let mut out_pos = 0usize;

        if !self.header_written {
            if input.is_empty() && flush != Flush::Finish {
                return Ok(StreamProgress {
                    consumed: 0,
                    produced: 0,
                    status: StreamStatus::More,
                });
            }
            if output.len() < SYMBOL_SPACE {
                return Ok(StreamProgress {
                    consumed: 0,
                    produced: 0,
                    status: StreamStatus::More,
                });
            }
            self.block_final = flush == Flush::Finish;
            self.put_bits(output, &mut out_pos, self.block_final as u32, 1);
            self.put_bits(output, &mut out_pos, 1, 2); // fixed Huffman
            self.header_written = true;
        }

        loop {
            if output.len() - out_pos < SYMBOL_SPACE {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }

            if in_pos < input.len() {
                let found = if self.level >= 3 {
                    self.longest_match(input, in_pos)
                } else {
                    None
                };
                match found {
                    Some((length, distance)) => {
                        self.emit_match(output, &mut out_pos, length, distance);
                        for _ in 0..length {
                            self.insert_hash(input, in_pos);
                            self.consume(input[in_pos]);
                            in_pos += 1;
                        }
                    }
                    None => {
                        let byte = input[in_pos];
                        self.emit_literal(output, &mut out_pos, byte);
                        self.insert_hash(input, in_pos);
                        self.consume(byte);
                        in_pos += 1;
                    }
                }
                continue;
            }

            // All input consumed.
            if flush != Flush::Finish {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }

            let (code, len) = self.literals.code(EOB as usize);
            self.put_code(output, &mut out_pos, code, len);
            if !self.block_final {
                // The open block was not marked final; close the
                // stream with an empty final fixed block.
                self.put_bits(output, &mut out_pos, 1, 1);
                self.put_bits(output, &mut out_pos, 1, 2);
                let (code, len) = self.literals.code(EOB as usize);
                self.put_code(output, &mut out_pos, code, len);
            }
            self.flush_bits(output, &mut out_pos);
            self.finished = true;
            return Ok(StreamProgress {
                consumed: in_pos,
                produced: out_pos,
                status: StreamStatus::End,
            });
        }
    }
}

/// Reverse the low `len` bits of `code` so canonical (MSB-first)
/// Huffman codes travel correctly through the LSB-first bit writer.
fn reverse_bits(code: u16, len: u8) -> u16 {
    let mut reversed = 0u16;
    for i in 0..len {
        reversed |= ((code >> i) & 1) << (len - 1 - i);
    }
    reversed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::deflate::Inflater;
    use crate::codec::{Decoder, StreamStatus};

    fn deflate_all(data: &[u8], level: i32) -> Vec<u8> {
        let mut enc = Deflater::new(level, 15).unwrap();
        let mut out = vec![0u8; data.len() * 2 + 64];
        let p = enc.process(data, &mut out, Flush::Finish).unwrap();
        assert_eq!(p.status, StreamStatus::End);
        assert_eq!(p.consumed, data.len());
        out.truncate(p.produced);
        out
    }

    fn inflate_all(stream: &[u8], cap: usize) -> Vec<u8> {
        let mut dec = Inflater::new(-15).unwrap();
        let mut out = vec![0u8; cap];
        let p = dec.process(stream, &mut out, Flush::Finish).unwrap();
        assert_eq!(p.status, StreamStatus::End);
        out.truncate(p.produced);
        out
    }

    #[test]
    fn reverse_bits_flips_msb_and_lsb() {
        assert_eq!(reverse_bits(0b0000001, 7), 0b1000000);
        assert_eq!(reverse_bits(0x30, 8), 0x0c);
        assert_eq!(reverse_bits(0, 7), 0);
    }

    #[test]
    fn empty_input_emits_the_two_byte_final_block() {
        assert_eq!(deflate_all(b"", 6), [0x03, 0x00]);
    }

    #[test]
    fn literal_stream_round_trips() {
        let data = b"The quick brown fox jumps over the lazy dog.";
        let stream = deflate_all(data, 6);
        assert_eq!(inflate_all(&stream, 256), data);
    }

    #[test]
    fn repetitive_input_compresses_and_round_trips() {
        let data = vec![b'A'; 1000];
        let stream = deflate_all(&data, 6);
        assert!(stream.len() < data.len());
        assert_eq!(inflate_all(&stream, 2000), data);
    }

    #[test]
    fn overlapping_matches_round_trip() {
        // Period-2 data forces distance < length copies.
        let data: Vec<u8> = std::iter::repeat([b'a', b'b'])
            .take(300)
            .flatten()
            .collect();
        let stream = deflate_all(&data, 9);
        assert_eq!(inflate_all(&stream, 1024), data);
    }

    #[test]
    fn level_zero_emits_stored_blocks() {
        let data = b"stored, not compressed";
        let stream = deflate_all(data, 0);
        // final stored block: marker, LEN, NLEN, then the raw bytes
        assert_eq!(stream[0], 1);
        assert_eq!(
            u16::from_le_bytes([stream[1], stream[2]]) as usize,
            data.len()
        );
        assert_eq!(inflate_all(&stream, 64), data);
    }

    #[test]
    fn level_zero_splits_oversized_input() {
        let data = vec![0x5au8; 70_000];
        let stream = deflate_all(&data, 0);
        assert_eq!(inflate_all(&stream, 80_000), data);
    }

    #[test]
    fn low_levels_emit_literals_only_and_round_trip() {
        let data = vec![b'z'; 400];
        let stream = deflate_all(&data, 1);
        assert_eq!(inflate_all(&stream, 512), data);
    }

    #[test]
    fn every_level_round_trips_mixed_data() {
        let mut data = Vec::new();
        for i in 0..2000u32 {
            data.push((i % 251) as u8);
            if i % 7 == 0 {
                data.extend_from_slice(b"repeated phrase ");
            }
        }
        for level in 0..=9 {
            let stream = deflate_all(&data, level);
            assert_eq!(inflate_all(&stream, data.len() + 16), data, "level {level}");
        }
    }

    #[test]
    fn output_bottleneck_pauses_and_resumes() {
        let data = vec![b'Q'; 5000];
        let mut enc = Deflater::new(6, 15).unwrap();
        let mut stream = Vec::new();
        let mut chunk = [0u8; 16];
        let mut consumed = 0;
        loop {
            let p = enc
                .process(&data[consumed..], &mut chunk, Flush::Finish)
                .unwrap();
            consumed += p.consumed;
            stream.extend_from_slice(&chunk[..p.produced]);
            if p.status == StreamStatus::End {
                break;
            }
        }
        assert_eq!(consumed, data.len());
        assert_eq!(inflate_all(&stream, 6000), data);
    }

    #[test]
    fn multi_call_encoding_closes_with_a_final_block() {
        let mut enc = Deflater::new(6, 15).unwrap();
        let mut out = vec![0u8; 256];
        let mut out_pos = 0;
        for part in [b"hello ".as_slice(), b"streaming ".as_slice()] {
            let p = enc.process(part, &mut out[out_pos..], Flush::None).unwrap();
            assert_eq!(p.consumed, part.len());
            out_pos += p.produced;
        }
        let p = enc.process(b"world", &mut out[out_pos..], Flush::Finish).unwrap();
        assert_eq!(p.status, StreamStatus::End);
        out_pos += p.produced;
        assert_eq!(inflate_all(&out[..out_pos], 64), b"hello streaming world");
    }
}
