//! The streaming codec contract shared by every compressor and
//! decompressor, plus the method-id dispatch table the archive engine
//! selects codecs through.
//!
//! A codec session is created by [`Codec::new_encoder`] or
//! [`Codec::new_decoder`], stepped by `process`, and released by drop.
//! Each `process` call consumes a prefix of the input slice, produces
//! a prefix of the output slice, and reports whether the logical
//! stream is complete. [`Flush::Finish`] signals that no further input
//! will arrive; the session must then drain any buffered state before
//! reporting [`StreamStatus::End`]. No byte may be dropped or
//! duplicated across calls.

pub mod deflate;
pub mod store;
pub mod stubs;
#[cfg(feature = "zstd-support")]
pub mod zstd;

use crate::error::{Result, ZipError};

/// Flush directive for a `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// More input may follow.
    None,
    /// No further input will arrive; drain everything.
    Finish,
}

/// Whether the logical stream is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// More calls may follow; the caller must supply more output space
    /// if input remains unconsumed.
    More,
    /// End of stream; further calls make no progress.
    End,
}

/// What one `process` call did.
#[derive(Debug, Clone, Copy)]
pub struct StreamProgress {
    /// Bytes consumed from the front of the input slice.
    pub consumed: usize,
    /// Bytes produced at the front of the output slice.
    pub produced: usize,
    pub status: StreamStatus,
}

/// One direction of a codec session: raw bytes in, encoded bytes out.
pub trait Encoder {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress>;
}

/// The other direction: encoded bytes in, raw bytes out.
pub trait Decoder {
    fn process(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamProgress>;
}

/// Compression methods and their on-wire 16-bit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Store,
    Deflate,
    Lzma,
    Zstd,
    Lz4,
    Brotli,
    Lzfse,
}

impl Method {
    /// The ZIP central-directory method id.
    pub fn id(self) -> u16 {
        match self {
            Method::Store => 0,
            Method::Deflate => 8,
            Method::Lzma => 14,
            Method::Zstd => 93,
            Method::Lz4 => 94,
            Method::Brotli => 97,
            Method::Lzfse => 100,
        }
    }

    pub fn from_id(id: u16) -> Option<Method> {
        match id {
            0 => Some(Method::Store),
            8 => Some(Method::Deflate),
            14 => Some(Method::Lzma),
            93 => Some(Method::Zstd),
            94 => Some(Method::Lz4),
            97 => Some(Method::Brotli),
            100 => Some(Method::Lzfse),
            _ => None,
        }
    }

    /// Command-line token for this method.
    pub fn token(self) -> &'static str {
        match self {
            Method::Store => "store",
            Method::Deflate => "deflate",
            Method::Lzma => "lzma",
            Method::Zstd => "zstd",
            Method::Lz4 => "lz4",
            Method::Brotli => "brotli",
            Method::Lzfse => "lzfse",
        }
    }

    pub fn from_token(token: &str) -> Option<Method> {
        match token {
            "store" => Some(Method::Store),
            "deflate" => Some(Method::Deflate),
            "lzma" => Some(Method::Lzma),
            "zstd" => Some(Method::Zstd),
            "lz4" => Some(Method::Lz4),
            "brotli" => Some(Method::Brotli),
            "lzfse" => Some(Method::Lzfse),
            _ => None,
        }
    }
}

/// A registered codec: a factory for encoder and decoder sessions.
pub trait Codec: Send + Sync {
    fn method(&self) -> Method;

    /// Create an encoder session. `level` is codec-specific; negative
    /// selects the codec's default.
    fn new_encoder(&self, level: i32) -> Result<Box<dyn Encoder>>;

    fn new_decoder(&self) -> Result<Box<dyn Decoder>>;

    /// True if the encoder wraps even empty input in a frame that
    /// should survive the archive's smaller-or-STORE fallback.
    fn frames_empty_input(&self) -> bool {
        false
    }
}

/// Dispatch table keyed by method id. Every compiled-in codec is
/// registered at construction; unknown ids surface
/// [`ZipError::UnsupportedMethod`].
pub struct Registry {
    codecs: Vec<Box<dyn Codec>>,
}

impl Registry {
    /// All codecs compiled into this build.
    pub fn builtin() -> Self {
        let mut codecs: Vec<Box<dyn Codec>> = vec![
            Box::new(store::StoreCodec),
            Box::new(deflate::DeflateCodec::default()),
            Box::new(stubs::ShimCodec::lzma()),
            Box::new(stubs::ShimCodec::lz4()),
            Box::new(stubs::ShimCodec::brotli()),
            Box::new(stubs::ShimCodec::lzfse()),
        ];
        #[cfg(feature = "zstd-support")]
        codecs.push(Box::new(zstd::ZstdCodec));
        Registry { codecs }
    }

    pub fn get(&self, method: Method) -> Result<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.method() == method)
            .map(|c| c.as_ref())
            .ok_or(ZipError::UnsupportedMethod(method.id()))
    }

    pub fn get_id(&self, id: u16) -> Result<&dyn Codec> {
        let method = Method::from_id(id).ok_or(ZipError::UnsupportedMethod(id))?;
        self.get(method)
    }

    pub fn supports(&self, id: u16) -> bool {
        self.get_id(id).is_ok()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::builtin()
    }
}

/// Run a whole buffer through an encoder session, growing the output
/// as needed, and return the encoded bytes.
pub fn encode_to_vec(codec: &dyn Codec, level: i32, input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = codec.new_encoder(level)?;
    // Worst-case guess in the compressBound spirit; grown below if a
    // codec needs more.
    let mut out = vec![0u8; input.len() + (input.len() >> 3) + 64];
    let mut consumed = 0;
    let mut produced = 0;
    let mut stalled = false;
    loop {
        let progress = encoder.process(&input[consumed..], &mut out[produced..], Flush::Finish)?;
        consumed += progress.consumed;
        produced += progress.produced;
        match progress.status {
            StreamStatus::End => {
                out.truncate(produced);
                return Ok(out);
            }
            StreamStatus::More => {
                if progress.consumed == 0 && progress.produced == 0 {
                    // Out of room (sessions may also pause short of
                    // the very end of the slice). A second stall in a
                    // row means the session is wedged, not cramped.
                    if stalled {
                        return Err(ZipError::CodecData("encoder made no progress"));
                    }
                    stalled = true;
                } else {
                    stalled = false;
                }
                if produced + 64 > out.len() {
                    let grow = (out.len() / 2).max(64);
                    out.resize(out.len() + grow, 0);
                }
            }
        }
    }
}

/// Run a whole buffer through a decoder session into a growable
/// vector. `size_hint` pre-sizes the output.
pub fn decode_to_vec(codec: &dyn Codec, input: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut decoder = codec.new_decoder()?;
    let mut out = vec![0u8; size_hint.max(64)];
    let mut consumed = 0;
    let mut produced = 0;
    let mut stalled = false;
    loop {
        let progress = decoder.process(&input[consumed..], &mut out[produced..], Flush::Finish)?;
        consumed += progress.consumed;
        produced += progress.produced;
        match progress.status {
            StreamStatus::End => {
                out.truncate(produced);
                return Ok(out);
            }
            StreamStatus::More => {
                if progress.consumed == 0 && progress.produced == 0 {
                    if stalled {
                        return Err(ZipError::CodecData("decoder made no progress"));
                    }
                    stalled = true;
                } else {
                    stalled = false;
                }
                if produced + 64 > out.len() {
                    let grow = (out.len() / 2).max(64);
                    out.resize(out.len() + grow, 0);
                }
            }
        }
    }
}

/// Decode a whole payload into an exact-size output buffer. The
/// stream must end precisely when the buffer is full; anything else
/// means the entry's declared size and its payload disagree.
pub fn decode_into(codec: &dyn Codec, input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut decoder = codec.new_decoder()?;
    let mut consumed = 0;
    let mut produced = 0;
    loop {
        let progress = decoder.process(&input[consumed..], &mut output[produced..], Flush::Finish)?;
        consumed += progress.consumed;
        produced += progress.produced;
        match progress.status {
            // Trailing input after end-of-stream (e.g. a zlib Adler
            // trailer) is ignored.
            StreamStatus::End => return Ok(produced),
            StreamStatus::More => {
                if produced == output.len() {
                    return Err(ZipError::CodecBuffer);
                }
                if progress.consumed == 0 && progress.produced == 0 {
                    return Err(ZipError::CodecData("decoder made no progress"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_ids_match_the_zip_registry() {
        assert_eq!(Method::Store.id(), 0);
        assert_eq!(Method::Deflate.id(), 8);
        assert_eq!(Method::Lzma.id(), 14);
        assert_eq!(Method::Zstd.id(), 93);
        assert_eq!(Method::Lz4.id(), 94);
        assert_eq!(Method::Brotli.id(), 97);
        assert_eq!(Method::Lzfse.id(), 100);
    }

    #[test]
    fn tokens_round_trip() {
        for m in [
            Method::Store,
            Method::Deflate,
            Method::Lzma,
            Method::Zstd,
            Method::Lz4,
            Method::Brotli,
            Method::Lzfse,
        ] {
            assert_eq!(Method::from_token(m.token()), Some(m));
            assert_eq!(Method::from_id(m.id()), Some(m));
        }
        assert_eq!(Method::from_token("bzip2"), None);
        assert_eq!(Method::from_id(12), None);
    }

    #[test]
    fn registry_rejects_unknown_ids() {
        let registry = Registry::builtin();
        assert!(registry.supports(0));
        assert!(registry.supports(8));
        assert!(!registry.supports(12));
        match registry.get_id(12) {
            Err(ZipError::UnsupportedMethod(12)) => {}
            other => panic!("expected UnsupportedMethod, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "zstd-support"))]
    #[test]
    fn zstd_is_unsupported_without_the_feature() {
        let registry = Registry::builtin();
        assert!(matches!(
            registry.get(Method::Zstd),
            Err(ZipError::UnsupportedMethod(93))
        ));
    }
}
