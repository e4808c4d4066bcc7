//! STORE (method 0): the identity codec.

use crate::codec::{Codec, Decoder, Encoder, Flush, Method, StreamProgress, StreamStatus};
use crate::error::Result;

pub struct StoreCodec;

impl Codec for StoreCodec {
    fn method(&self) -> Method {
        Method::Store
    }

    fn new_encoder(&self, _level: i32) -> Result<Box<dyn Encoder>> {
        Ok(Box::new(Copier))
    }

    fn new_decoder(&self) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(Copier))
    }
}

/// Copies input to output; both directions of STORE are the same.
struct Copier;

fn copy_step(input: &[u8], output: &mut [u8], flush: Flush) -> StreamProgress {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    let status = if flush == Flush::Finish && n == input.len() {
        StreamStatus::End
    } else {
        StreamStatus::More
    };
    StreamProgress {
        consumed: n,
        produced: n,
        status,
    }
}

impl Encoder for Copier {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        Ok(copy_step(input, output, flush))
    }
}

impl Decoder for Copier {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress> {
        Ok(copy_step(input, output, flush))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_to_vec, encode_to_vec};

    #[test]
    fn store_is_the_identity() {
        let data = b"identity transform".to_vec();
        let encoded = encode_to_vec(&StoreCodec, -1, &data).unwrap();
        assert_eq!(encoded, data);
        let decoded = decode_to_vec(&StoreCodec, &encoded, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_input_round_trips() {
        let encoded = encode_to_vec(&StoreCodec, -1, b"").unwrap();
        assert!(encoded.is_empty());
        assert!(decode_to_vec(&StoreCodec, &encoded, 0).unwrap().is_empty());
    }

    #[test]
    fn partial_output_space_never_drops_bytes() {
        let data = vec![7u8; 1000];
        let mut enc = StoreCodec.new_encoder(-1).unwrap();
        let mut out = vec![0u8; 1000];
        let mut consumed = 0;
        let mut produced = 0;
        // Feed through a 64-byte output bottleneck.
        while consumed < data.len() {
            let end = (produced + 64).min(out.len());
            let p = enc
                .process(&data[consumed..], &mut out[produced..end], Flush::Finish)
                .unwrap();
            consumed += p.consumed;
            produced += p.produced;
        }
        assert_eq!(out[..produced], data[..]);
    }
}
