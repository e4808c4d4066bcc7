//! The DEFLATE decoder: a resumable state machine over raw, fixed and
//! dynamic blocks.
//!
//! Output-side suspension is first class: when the output slice fills
//! mid-copy or before a decoded literal can be delivered, the residual
//! literal or (length, distance) pair is recorded and the next call
//! resumes from it before any new symbol is consumed. Input is
//! expected to be the complete stream by the time `Flush::Finish` is
//! seen; running dry mid-symbol is a data error.

use crate::codec::deflate::{
    HuffmanTable, CL_ORDER, DIST_BASE, DIST_EXTRA, EOB, LENGTH_BASE, LENGTH_EXTRA,
};
use crate::codec::{Decoder, Flush, StreamProgress, StreamStatus};
use crate::error::{Result, ZipError};

/// Wrapper format around the raw DEFLATE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrap {
    /// No wrapper (negative window-bits).
    None,
    /// RFC 1950 two-byte header (window-bits 8..=15).
    Zlib,
    /// RFC 1952 header (window-bits 24..=31).
    Gzip,
    /// Sniff zlib vs gzip from the first two bytes (window-bits 40..=47).
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// Between blocks: the next bits are a block header.
    Header,
    /// Copying the body of a stored block.
    RawCopy { remaining: u16 },
    /// Inside a fixed or dynamic Huffman block.
    InBlock,
}

/// A DEFLATE decoder session.
pub struct Inflater {
    bit_buffer: u32,
    bits_in: u32,
    final_block: bool,
    state: BlockState,
    literals: HuffmanTable,
    distances: HuffmanTable,

    window: Vec<u8>,
    window_mask: usize,
    window_pos: usize,

    wrap: Wrap,
    header_done: bool,

    pending_literal: Option<u8>,
    pending_copy: Option<(u16, u16)>,
    done: bool,
}

impl Inflater {
    /// Create a decoder. `window_bits` encodes both the window size
    /// and the wrapper mode:
    ///
    /// * negative, magnitude 8..=15: raw stream
    /// * 8..=15: zlib wrapper
    /// * 24..=31: gzip wrapper (16 + 8..=15)
    /// * 40..=47: auto-detect zlib vs gzip (32 + 8..=15)
    pub fn new(window_bits: i32) -> Result<Inflater> {
        let (wrap, magnitude) = if window_bits < 0 {
            (Wrap::None, -window_bits)
        } else if window_bits >= 40 {
            (Wrap::Auto, window_bits - 32)
        } else if window_bits >= 24 {
            (Wrap::Gzip, window_bits - 16)
        } else {
            (Wrap::Zlib, window_bits)
        };
        if !(8..=15).contains(&magnitude) {
            return Err(ZipError::InvalidArgument("window bits must encode 8..=15"));
        }
        let window_size = 1usize << magnitude;

        Ok(Inflater {
            bit_buffer: 0,
            bits_in: 0,
            final_block: false,
            state: BlockState::Header,
            literals: HuffmanTable::fixed_literals(),
            distances: HuffmanTable::fixed_distances(),
            window: vec![0u8; window_size],
            window_mask: window_size - 1,
            window_pos: 0,
            wrap,
            header_done: wrap == Wrap::None,
            pending_literal: None,
            pending_copy: None,
            done: false,
        })
    }

    fn push_window(&mut self, byte: u8) {
        self.window[self.window_pos] = byte;
        self.window_pos = (self.window_pos + 1) & self.window_mask;
    }

    /// Pull one bit, loading a new input byte when the buffer is dry.
    fn get_bit(&mut self, input: &[u8], in_pos: &mut usize) -> Result<u32> {
        if self.bits_in == 0 {
            if *in_pos >= input.len() {
                return Err(ZipError::CodecData("truncated deflate stream"));
            }
            self.bit_buffer = input[*in_pos] as u32;
            *in_pos += 1;
            self.bits_in = 8;
        }
        let bit = self.bit_buffer & 1;
        self.bit_buffer >>= 1;
        self.bits_in -= 1;
        Ok(bit)
    }

    /// Pull `n` bits, LSB-first.
    fn get_bits(&mut self, input: &[u8], in_pos: &mut usize, n: u32) -> Result<u32> {
        if self.bits_in >= n {
            let result = self.bit_buffer & ((1 << n) - 1);
            self.bit_buffer >>= n;
            self.bits_in -= n;
            return Ok(result);
        }
        let mut result = 0;
        for i in 0..n {
            result |= self.get_bit(input, in_pos)? << i;
        }
        Ok(result)
    }

    /// Read one Huffman symbol bit by bit against the active table.
    fn decode_symbol(&mut self, input: &[u8], in_pos: &mut usize, distance: bool) -> Result<u16> {
        let mut code = 0u16;
        for len in 1..=15u8 {
            let bit = self.get_bit(input, in_pos)?;
            code = (code << 1) | bit as u16;
            let table = if distance { &self.distances } else { &self.literals };
            if let Some(symbol) = table.lookup(len, code) {
                return Ok(symbol);
            }
        }
        Err(ZipError::CodecData("invalid huffman code"))
    }

    /// Read the dynamic-block prelude and install its tables.
    fn read_dynamic_tables(&mut self, input: &[u8], in_pos: &mut usize) -> Result<()> {
        let hlit = self.get_bits(input, in_pos, 5)? as usize + 257;
        let hdist = self.get_bits(input, in_pos, 5)? as usize + 1;
        let hclen = self.get_bits(input, in_pos, 4)? as usize + 4;

        let mut cl_lengths = [0u8; 19];
        for i in 0..hclen {
            cl_lengths[CL_ORDER[i]] = self.get_bits(input, in_pos, 3)? as u8;
        }
        let cl_table = HuffmanTable::build(&cl_lengths)?;

        let mut lengths = [0u8; 288 + 32];
        let total = hlit + hdist;
        let mut index = 0;
        while index < total {
            // Decode a code-length symbol with the prelude table.
            let mut code = 0u16;
            let mut symbol = None;
            for len in 1..=15u8 {
                let bit = self.get_bit(input, in_pos)?;
                code = (code << 1) | bit as u16;
                if let Some(s) = cl_table.lookup(len, code) {
                    symbol = Some(s);
                    break;
                }
            }
            let symbol = symbol.ok_or(ZipError::CodecData("invalid code-length code"))?;

            match symbol {
                0..=15 => {
                    lengths[index] = symbol as u8;
                    index += 1;
                }
                16 => {
                    if index == 0 {
                        return Err(ZipError::CodecData("repeat with no previous code length"));
                    }
                    let value = lengths[index - 1];
                    let count = self.get_bits(input, in_pos, 2)? as usize + 3;
                    if index + count > total {
                        return Err(ZipError::CodecData("code-length repeat overruns table"));
                    }
                    lengths[index..index + count].fill(value);
                    index += count;
                }
                17 => {
                    let count = self.get_bits(input, in_pos, 3)? as usize + 3;
                    if index + count > total {
                        return Err(ZipError::CodecData("code-length repeat overruns table"));
                    }
                    index += count;
                }
                18 => {
                    let count = self.get_bits(input, in_pos, 7)? as usize + 11;
                    if index + count > total {
                        return Err(ZipError::CodecData("code-length repeat overruns table"));
                    }
                    index += count;
                }
                _ => return Err(ZipError::CodecData("invalid code-length symbol")),
            }
        }

        self.literals = HuffmanTable::build(&lengths[..hlit])?;
        self.distances = HuffmanTable::build(&lengths[hlit..hlit + hdist])?;
        Ok(())
    }

    /// Copy up to `length` back-referenced bytes, recording a pending
    /// copy if the output fills first.
    fn copy_from_window(
        &mut self,
        output: &mut [u8],
        out_pos: &mut usize,
        mut length: u16,
        distance: u16,
    ) {
        while length > 0 && *out_pos < output.len() {
            let src = self.window_pos.wrapping_sub(distance as usize) & self.window_mask;
            let byte = self.window[src];
            output[*out_pos] = byte;
            *out_pos += 1;
            self.push_window(byte);
            length -= 1;
        }
        self.pending_copy = if length > 0 {
            Some((length, distance))
        } else {
            None
        };
    }

    /// Strip the wrapper header, if any, before the first DEFLATE bit.
    fn peel_wrapper(&mut self, input: &[u8], in_pos: &mut usize) -> Result<()> {
        let skip = match self.wrap {
            Wrap::None => 0,
            Wrap::Gzip => skip_gzip_header(&input[*in_pos..])?,
            Wrap::Zlib => skip_zlib_header(&input[*in_pos..])?,
            Wrap::Auto => {
                let rest = &input[*in_pos..];
                if rest.len() >= 2 && rest[0] == 0x1f && rest[1] == 0x8b {
                    skip_gzip_header(rest)?
                } else {
                    skip_zlib_header(rest)?
                }
            }
        };
        *in_pos += skip;
        self.header_done = true;
        Ok(())
    }
}

impl Decoder for Inflater {
    fn process(&mut self, input: &[u8], output: &mut [u8], _flush: Flush) -> Result<StreamProgress> {
        let mut in_pos = 0usize;
        let mut out_pos = 0usize;

        if self.done {
            return Ok(StreamProgress {
                consumed: 0,
                produced: 0,
                status: StreamStatus::End,
            });
        }

        if !self.header_done {
            self.peel_wrapper(input, &mut in_pos)?;
        }

        // Deliver any fragment suspended by a full output slice before
        // consuming new symbols.
        if let Some(byte) = self.pending_literal {
            if out_pos >= output.len() {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }
            output[out_pos] = byte;
            out_pos += 1;
            self.push_window(byte);
            self.pending_literal = None;
        }
        if let Some((length, distance)) = self.pending_copy {
            self.copy_from_window(output, &mut out_pos, length, distance);
            if self.pending_copy.is_some() {
                return Ok(StreamProgress {
                    consumed: in_pos,
                    produced: out_pos,
                    status: StreamStatus::More,
                });
            }
        }

        loop {
            match self.state {
                BlockState::Header => {
                    self.final_block = self.get_bit(input, &mut in_pos)? == 1;
                    match self.get_bits(input, &mut in_pos, 2)? {
                        0 => {
                            // Stored block: discard the fractional byte,
                            // then LEN/NLEN come byte-aligned.
                            self.bit_buffer = 0;
                            self.bits_in = 0;
                            if input.len() - in_pos < 4 {
                                return Err(ZipError::CodecData("truncated stored block header"));
                            }
                            let len = u16::from_le_bytes([input[in_pos], input[in_pos + 1]]);
                            let nlen = u16::from_le_bytes([input[in_pos + 2], input[in_pos + 3]]);
                            in_pos += 4;
                            if len != !nlen {
                                return Err(ZipError::CodecData("stored block length check failed"));
                            }
                            self.state = BlockState::RawCopy { remaining: len };
                        }
                        1 => {
                            self.literals = HuffmanTable::fixed_literals();
                            self.distances = HuffmanTable::fixed_distances();
                            self.state = BlockState::InBlock;
                        }
                        2 => {
                            self.read_dynamic_tables(input, &mut in_pos)?;
                            self.state = BlockState::InBlock;
                        }
                        _ => return Err(ZipError::CodecData("reserved block type")),
                    }
                }

                BlockState::RawCopy { remaining } => {
                    let available = (input.len() - in_pos).min(output.len() - out_pos);
                    let n = (remaining as usize).min(available);
                    for i in 0..n {
                        let byte = input[in_pos + i];
                        output[out_pos + i] = byte;
                        self.push_window(byte);
                    }
                    in_pos += n;
                    out_pos += n;
                    let left = remaining - n as u16;
                    if left > 0 {
                        self.state = BlockState::RawCopy { remaining: left };
                        if out_pos >= output.len() {
                            // Output full; resume the copy next call.
                            return Ok(StreamProgress {
                                consumed: in_pos,
                                produced: out_pos,
                                status: StreamStatus::More,
                            });
                        }
                        return Err(ZipError::CodecData("truncated stored block"));
                    }
                    self.state = BlockState::Header;
                    if self.final_block {
                        self.done = true;
                        return Ok(StreamProgress {
                            consumed: in_pos,
                            produced: out_pos,
                            status: StreamStatus::End,
                        });
                    }
                }

                BlockState::InBlock => {
                    let symbol = self.decode_symbol(input, &mut in_pos, false)?;
                    if symbol < 256 {
                        let byte = symbol as u8;
                        if out_pos >= output.len() {
                            self.pending_literal = Some(byte);
                            return Ok(StreamProgress {
                                consumed: in_pos,
                                produced: out_pos,
                                status: StreamStatus::More,
                            });
                        }
                        output[out_pos] = byte;
                        out_pos += 1;
                        self.push_window(byte);
                    } else if symbol == EOB {
                        self.state = BlockState::Header;
                        if self.final_block {
                            self.done = true;
                            return Ok(StreamProgress {
                                consumed: in_pos,
                                produced: out_pos,
                                status: StreamStatus::End,
                            });
                        }
                    } else if symbol <= 285 {
                        let idx = (symbol - 257) as usize;
                        let mut length = LENGTH_BASE[idx] as u32;
                        let extra = LENGTH_EXTRA[idx] as u32;
                        if extra > 0 {
                            length += self.get_bits(input, &mut in_pos, extra)?;
                        }

                        let dist_symbol = self.decode_symbol(input, &mut in_pos, true)?;
                        if dist_symbol > 29 {
                            return Err(ZipError::CodecData("invalid distance code"));
                        }
                        let didx = dist_symbol as usize;
                        let mut distance = DIST_BASE[didx] as u32;
                        let dextra = DIST_EXTRA[didx] as u32;
                        if dextra > 0 {
                            distance += self.get_bits(input, &mut in_pos, dextra)?;
                        }
                        if distance as usize > self.window.len() {
                            return Err(ZipError::CodecData("distance exceeds window"));
                        }

                        self.copy_from_window(output, &mut out_pos, length as u16, distance as u16);
                        if self.pending_copy.is_some() {
                            return Ok(StreamProgress {
                                consumed: in_pos,
                                produced: out_pos,
                                status: StreamStatus::More,
                            });
                        }
                    } else {
                        return Err(ZipError::CodecData("invalid literal/length code"));
                    }
                }
            }
        }
    }
}

// Gzip header flag bits (RFC 1952).
const GZIP_FHCRC: u8 = 0x02;
const GZIP_FEXTRA: u8 = 0x04;
const GZIP_FNAME: u8 = 0x08;
const GZIP_FCOMMENT: u8 = 0x10;

/// Validate and measure a gzip header; returns the bytes to skip.
fn skip_gzip_header(buf: &[u8]) -> Result<usize> {
    if buf.len() < 10 {
        return Err(ZipError::CodecData("truncated gzip header"));
    }
    if buf[0] != 0x1f || buf[1] != 0x8b {
        return Err(ZipError::CodecData("bad gzip magic"));
    }
    if buf[2] != 8 {
        return Err(ZipError::CodecData("gzip method is not deflate"));
    }
    let flags = buf[3];
    // flags(1) + mtime(4) + xfl(1) + os(1) follow the magic and method.
    let mut pos = 10usize;

    if flags & GZIP_FEXTRA != 0 {
        if pos + 2 > buf.len() {
            return Err(ZipError::CodecData("truncated gzip extra field"));
        }
        let xlen = u16::from_le_bytes([buf[pos], buf[pos + 1]]) as usize;
        pos += 2 + xlen;
        if pos > buf.len() {
            return Err(ZipError::CodecData("truncated gzip extra field"));
        }
    }
    if flags & GZIP_FNAME != 0 {
        pos = skip_nul_terminated(buf, pos)?;
    }
    if flags & GZIP_FCOMMENT != 0 {
        pos = skip_nul_terminated(buf, pos)?;
    }
    if flags & GZIP_FHCRC != 0 {
        pos += 2;
        if pos > buf.len() {
            return Err(ZipError::CodecData("truncated gzip header crc"));
        }
    }
    Ok(pos)
}

fn skip_nul_terminated(buf: &[u8], mut pos: usize) -> Result<usize> {
    while pos < buf.len() && buf[pos] != 0 {
        pos += 1;
    }
    if pos >= buf.len() {
        return Err(ZipError::CodecData("unterminated gzip header field"));
    }
    Ok(pos + 1)
}

/// Validate and measure a zlib header; returns the bytes to skip.
fn skip_zlib_header(buf: &[u8]) -> Result<usize> {
    if buf.len() < 2 {
        return Err(ZipError::CodecData("truncated zlib header"));
    }
    let cmf = buf[0];
    let flg = buf[1];
    if cmf & 0x0f != 8 {
        return Err(ZipError::CodecData("zlib method is not deflate"));
    }
    if (cmf as u32 * 256 + flg as u32) % 31 != 0 {
        return Err(ZipError::CodecData("zlib header checksum failed"));
    }
    let mut pos = 2usize;
    if flg & 0x20 != 0 {
        // Preset dictionary id.
        pos += 4;
        if pos > buf.len() {
            return Err(ZipError::CodecData("truncated zlib dictionary id"));
        }
    }
    Ok(pos)
}
