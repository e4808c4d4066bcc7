//! ZSTD (method 93) backed by the real `zstd` crate.
//!
//! Compiled in behind the `zstd-support` feature. Sessions buffer
//! their input and run a whole frame at flush time, then drain the
//! result through the streaming contract; the archive engine hands
//! codecs complete payloads anyway, so nothing is lost by the
//! buffering.

use crate::codec::{Codec, Decoder, Encoder, Flush, Method, StreamProgress, StreamStatus};
use crate::error::{Result, ZipError};

pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn method(&self) -> Method {
        Method::Zstd
    }

    fn new_encoder(&self, level: i32) -> Result<Box<dyn Encoder>> {
        let level = if level < 0 { 3 } else { level.min(19) };
        Ok(Box::new(ZstdSession {
            level,
            decode: false,
            buffered: Vec::new(),
            result: None,
            drained: 0,
        }))
    }

    fn new_decoder(&self) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(ZstdSession {
            level: 0,
            decode: true,
            buffered: Vec::new(),
            result: None,
            drained: 0,
        }))
    }
}

struct ZstdSession {
    level: i32,
    decode: bool,
    buffered: Vec<u8>,
    result: Option<Vec<u8>>,
    drained: usize,
}

impl ZstdSession {
    fn step(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        let mut consumed = 0;
        if self.result.is_none() {
            self.buffered.extend_from_slice(input);
            consumed = input.len();
            if flush != Flush::Finish {
                return Ok(StreamProgress {
                    consumed,
                    produced: 0,
                    status: StreamStatus::More,
                });
            }
            let result = if self.decode {
                zstd::stream::decode_all(&self.buffered[..])
                    .map_err(|_| ZipError::CodecData("invalid zstd frame"))?
            } else {
                zstd::stream::encode_all(&self.buffered[..], self.level)
                    .map_err(|_| ZipError::CodecData("zstd compression failed"))?
            };
            self.buffered.clear();
            self.result = Some(result);
        }

        let result = self.result.as_ref().expect("result was just produced");
        let n = (result.len() - self.drained).min(output.len());
        output[..n].copy_from_slice(&result[self.drained..self.drained + n]);
        self.drained += n;
        let status = if self.drained == result.len() {
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

impl Encoder for ZstdSession {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        self.step(input, output, flush)
    }
}

impl Decoder for ZstdSession {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        self.step(input, output, flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_to_vec, encode_to_vec};

    #[test]
    fn zstd_round_trips_and_compresses() {
        let data = vec![42u8; 10_000];
        let encoded = encode_to_vec(&ZstdCodec, -1, &data).unwrap();
        assert!(encoded.len() < data.len() / 2);
        let decoded = decode_to_vec(&ZstdCodec, &encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn garbage_input_is_a_data_error() {
        assert!(matches!(
            decode_to_vec(&ZstdCodec, b"not a zstd frame", 64),
            Err(ZipError::CodecData(_))
        ));
    }
}
