//! Error types for c-zip

use std::io;
use thiserror::Error;

/// Result type for c-zip operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Error kinds surfaced by the archive engine and the codec layer.
///
/// Errors are returned, never recovered internally. The one internal
/// retry (encoded output not smaller than the input falls back to
/// STORE) is a decision in the add path, not an error.
#[derive(Debug, Error)]
pub enum ZipError {
    /// Caller passed an impossible combination of arguments
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Entry lookup by name failed
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Exclusive open requested but the file already exists
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// Mutation attempted on a read-only handle
    #[error("archive is read-only")]
    ReadOnly,

    /// The backing stream could not be opened
    #[error("cannot open archive")]
    CannotOpen(#[source] io::Error),

    /// Read or seek on the backing stream failed
    #[error("I/O read error")]
    IoRead(#[source] io::Error),

    /// Write on the backing stream failed
    #[error("I/O write error")]
    IoWrite(#[source] io::Error),

    /// An allocation failed
    #[error("out of memory ({0} bytes requested)")]
    ResourceExhausted(usize),

    /// The ZIP structure is inconsistent (bad signature, truncated
    /// header, impossible offsets, invalid size fields)
    #[error("malformed archive: {0}")]
    MalformedArchive(&'static str),

    /// Codec method id not compiled in
    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    /// Compressed stream invalid for its method
    #[error("compressed data error: {0}")]
    CodecData(&'static str),

    /// Caller-provided output slice too small to make progress
    #[error("codec output buffer too small")]
    CodecBuffer,

    /// Strict CRC verification failed on extract
    #[error("CRC mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    CrcMismatch { stored: u32, computed: u32 },

    /// Declared uncompressed size exceeds the expansion guard
    #[error("entry expands past the zipbomb guard ({declared} bytes declared, {allowed} allowed)")]
    ExpansionLimit { declared: u64, allowed: u64 },
}
