//! Opaque shim codecs for LZMA, LZ4, BROTLI and LZFSE.
//!
//! These satisfy the codec contract and nothing more: the payload is
//! framed with a method tag and a length, and only the matching shim
//! decoder consumes it. They deliberately do not interoperate with the
//! eponymous public formats; the container treats every codec's output
//! as opaque bytes, so a conforming plug-in is free to do this.

use crate::codec::{Codec, Decoder, Encoder, Flush, Method, StreamProgress, StreamStatus};
use crate::error::{Result, ZipError};

/// Frame: 4-byte tag, 4-byte little-endian payload length, payload.
const FRAME_HEADER: usize = 8;

pub struct ShimCodec {
    method: Method,
    tag: [u8; 4],
    /// Whether an empty input still gets a frame the archive's
    /// smaller-or-STORE fallback must keep.
    frames_empty: bool,
}

impl ShimCodec {
    pub fn lzma() -> ShimCodec {
        ShimCodec {
            method: Method::Lzma,
            tag: *b"sLZM",
            frames_empty: false,
        }
    }

    pub fn lz4() -> ShimCodec {
        ShimCodec {
            method: Method::Lz4,
            tag: *b"sLZ4",
            frames_empty: false,
        }
    }

    pub fn brotli() -> ShimCodec {
        ShimCodec {
            method: Method::Brotli,
            tag: *b"sBRO",
            frames_empty: true,
        }
    }

    pub fn lzfse() -> ShimCodec {
        ShimCodec {
            method: Method::Lzfse,
            tag: *b"sLZF",
            frames_empty: false,
        }
    }
}

impl Codec for ShimCodec {
    fn method(&self) -> Method {
        self.method
    }

    fn new_encoder(&self, _level: i32) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(ShimEncoder {
            tag: self.tag,
            buffered: Vec::new(),
            frame: None,
            drained: 0,
        }))
    }

    fn new_decoder(&self) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(ShimDecoder {
            tag: self.tag,
            header: Vec::new(),
            remaining: 0,
        }))
    }

    fn frames_empty_input(&self) -> bool {
        self.frames_empty
    }
}

/// Buffers the whole payload, then drains one frame.
struct ShimEncoder {
    tag: [u8; 4],
    buffered: Vec<u8>,
    frame: Option<Vec<u8>>,
    drained: usize,
}

impl Encoder for ShimEncoder {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        let mut consumed = 0;
        if self.frame.is_none() {
            self.buffered.extend_from_slice(input);
            consumed = input.len();
            if flush != Flush::Finish {
                return Ok(StreamProgress {
                    consumed,
                    produced: 0,
                    status: StreamStatus::More,
                });
            }
            if self.buffered.len() > u32::MAX as usize {
                return Err(ZipError::CodecData("shim payload exceeds frame limit"));
            }
            let mut frame = Vec::with_capacity(FRAME_HEADER + self.buffered.len());
            frame.extend_from_slice(&self.tag);
            frame.extend_from_slice(&(self.buffered.len() as u32).to_le_bytes());
            frame.append(&mut self.buffered);
            self.frame = Some(frame);
        }

        let frame = self.frame.as_ref().expect("frame was just built");
        let n = (frame.len() - self.drained).min(output.len());
        output[..n].copy_from_slice(&frame[self.drained..self.drained + n]);
        self.drained += n;
        let status = if self.drained == frame.len() {
            StreamStatus::End
        } else {
            StreamStatus::More
        };
        Ok(StreamProgress {
            consumed,
            produced: n,
            status,
        })
    }
}

/// Validates the frame header, then copies the payload through.
struct ShimDecoder {
    tag: [u8; 4],
    header: Vec<u8>,
    remaining: u32,
}

impl Decoder for ShimDecoder {
    fn process(&mut self, input: &[u8], output: &mut [u8], _flush: Flush) -> Result<StreamProgress> {
        let mut in_pos = 0usize;

        while self.header.len() < FRAME_HEADER {
            if in_pos >= input.len() {
                return Err(ZipError::CodecData("truncated shim frame header"));
            }
            self.header.push(input[in_pos]);
            in_pos += 1;
            if self.header.len() == FRAME_HEADER {
                if self.header[..4] != self.tag {
                    return Err(ZipError::CodecData("shim frame tag mismatch"));
                }
                self.remaining = u32::from_le_bytes([
                    self.header[4],
                    self.header[5],
                    self.header[6],
                    self.header[7],
                ]);
            }
        }

        let available = (input.len() - in_pos).min(output.len());
        let n = (self.remaining as usize).min(available);
        output[..n].copy_from_slice(&input[in_pos..in_pos + n]);
        in_pos += n;
        self.remaining -= n as u32;

        if self.remaining == 0 {
            return Ok(StreamProgress {
                consumed: in_pos,
                produced: n,
                status: StreamStatus::End,
            });
        }
        if in_pos == input.len() && output.len() > n {
            return Err(ZipError::CodecData("truncated shim frame payload"));
        }
        Ok(StreamProgress {
            consumed: in_pos,
            produced: n,
            status: StreamStatus::More,
        })
    }
}
