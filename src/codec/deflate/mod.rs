//! DEFLATE (method 8): a self-contained RFC 1951 codec.
//!
//! The decoder handles raw, fixed-Huffman and dynamic-Huffman blocks
//! with resumable output, and can peel zlib (RFC 1950) and gzip
//! (RFC 1952) wrappers. The encoder emits fixed-Huffman blocks over a
//! hash-chain LZ77 matcher, or stored blocks at level 0.
//!
//! Bit-stream convention: bits are packed LSB-first into bytes;
//! Huffman codes are packed MSB-first within each code.

mod encoder;
mod inflate;

pub use encoder::Deflater;
pub use inflate::Inflater;

use crate::codec::{Codec, Decoder, Encoder, Method};
use crate::error::{Result, ZipError};

/// Default compression level when the caller passes a negative one.
pub const DEFAULT_LEVEL: i32 = 6;
/// Default window size exponent (32 KiB window).
pub const DEFAULT_WINDOW_BITS: u32 = 15;

/// Base lengths for length codes 257..=285 (RFC 1951 §3.2.5).
pub(crate) const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length codes 257..=285.
pub(crate) const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distances for distance codes 0..=29.
pub(crate) const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance codes 0..=29.
pub(crate) const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of the code-length alphabet in dynamic blocks.
pub(crate) const CL_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// End-of-block symbol.
pub(crate) const EOB: u16 = 256;

/// A canonical Huffman code table: per-symbol code and bit length.
///
/// Symbols are matched one bit at a time against the (length, code)
/// pairs, up to 15 bits. That is O(symbols x 15) and plenty for this
/// codec's purposes.
pub(crate) struct HuffmanTable {
    codes: [u16; 288],
    lengths: [u8; 288],
    count: usize,
}

impl HuffmanTable {
    /// Build a canonical table from per-symbol code lengths
    /// (RFC 1951 §3.2.2).
    pub(crate) fn build(lengths: &[u8]) -> Result<HuffmanTable> {
        debug_assert!(lengths.len() <= 288);
        let mut bl_count = [0u16; 16];
        for &len in lengths {
            if len > 15 {
                return Err(ZipError::CodecData("huffman code length exceeds 15 bits"));
            }
            if len > 0 {
                bl_count[len as usize] += 1;
            }
        }

        let mut next_code = [0u16; 16];
        let mut code = 0u16;
        for bits in 1..16 {
            code = (code.wrapping_add(bl_count[bits - 1])) << 1;
            next_code[bits] = code;
        }

        let mut table = HuffmanTable {
            codes: [0; 288],
            lengths: [0; 288],
            count: lengths.len(),
        };
        for (i, &len) in lengths.iter().enumerate() {
            if len > 0 {
                table.codes[i] = next_code[len as usize];
                next_code[len as usize] = next_code[len as usize].wrapping_add(1);
                table.lengths[i] = len;
            }
        }
        Ok(table)
    }

    /// The fixed literal/length table: lengths 8/9/7/8 over the four
    /// canonical symbol ranges.
    pub(crate) fn fixed_literals() -> HuffmanTable {
        let mut lengths = [0u8; 288];
        lengths[0..144].fill(8);
        lengths[144..256].fill(9);
        lengths[256..280].fill(7);
        lengths[280..288].fill(8);
        HuffmanTable::build(&lengths).expect("fixed literal lengths are valid")
    }

    /// The fixed distance table: thirty-two 5-bit codes.
    pub(crate) fn fixed_distances() -> HuffmanTable {
        HuffmanTable::build(&[5u8; 32]).expect("fixed distance lengths are valid")
    }

    /// Look up the symbol whose code of exactly `len` bits equals
    /// `code`, if any.
    pub(crate) fn lookup(&self, len: u8, code: u16) -> Option<u16> {
        for i in 0..self.count {
            if self.lengths[i] == len && self.codes[i] == code {
                return Some(i as u16);
            }
        }
        None
    }

    pub(crate) fn code(&self, symbol: usize) -> (u16, u8) {
        (self.codes[symbol], self.lengths[symbol])
    }
}

/// The DEFLATE codec as registered for ZIP (raw streams, no wrapper).
pub struct DeflateCodec {
    window_bits: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        DeflateCodec {
            window_bits: DEFAULT_WINDOW_BITS,
        }
    }
}

impl Codec for DeflateCodec {
    fn method(&self) -> Method {
        Method::Deflate
    }

    fn new_encoder(&self, level: i32) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(Deflater::new(level, self.window_bits)?))
    }

    fn new_decoder(&self) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(Inflater::new(-(self.window_bits as i32))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_literal_codes_match_the_rfc() {
        let table = HuffmanTable::fixed_literals();
        // RFC 1951 §3.2.6: 0 -> 00110000, 144 -> 110010000,
        // 256 -> 0000000, 280 -> 11000000.
        assert_eq!(table.code(0), (0x30, 8));
        assert_eq!(table.code(143), (0xbf, 8));
        assert_eq!(table.code(144), (0x190, 9));
        assert_eq!(table.code(255), (0x1ff, 9));
        assert_eq!(table.code(256), (0x00, 7));
        assert_eq!(table.code(279), (0x17, 7));
        assert_eq!(table.code(280), (0xc0, 8));
        assert_eq!(table.code(287), (0xc7, 8));
    }

    #[test]
    fn lookup_is_exact_on_length_and_code() {
        let table = HuffmanTable::fixed_literals();
        assert_eq!(table.lookup(7, 0), Some(256));
        assert_eq!(table.lookup(8, 0x30), Some(0));
        // 0x30 is only valid at 8 bits
        assert_eq!(table.lookup(9, 0x30), None);
    }

    #[test]
    fn canonical_build_matches_the_rfc_example() {
        // RFC 1951 §3.2.2 worked example: lengths (3,3,3,3,3,2,4,4)
        // yield codes 010,011,100,101,110,00,1110,1111.
        let table = HuffmanTable::build(&[3, 3, 3, 3, 3, 2, 4, 4]).unwrap();
        assert_eq!(table.code(0), (0b010, 3));
        assert_eq!(table.code(5), (0b00, 2));
        assert_eq!(table.code(6), (0b1110, 4));
        assert_eq!(table.code(7), (0b1111, 4));
    }

    #[test]
    fn overlong_lengths_are_rejected() {
        assert!(HuffmanTable::build(&[16, 0, 0]).is_err());
    }
}
