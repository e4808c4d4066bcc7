//! # c-zip: ZIP archives with pluggable compression codecs
//!
//! `c-zip` is a self-contained ZIP library: it reads and writes
//! single-disk PKZIP archives and routes entry payloads through a
//! small set of streaming codecs. DEFLATE is implemented in-tree
//! (RFC 1951, with zlib/gzip wrapper support for standalone use);
//! STORE is the identity; further methods plug into the same session
//! contract.
//!
//! ## Features
//!
//! - **Read and write**: central-directory parsing with hardened
//!   validation, archive creation, and in-place append
//! - **Zipbomb defence**: declared expansion is capped before any
//!   buffer is allocated
//! - **Pluggable codecs**: a method-id dispatch table; unknown ids
//!   fail cleanly instead of being guessed at
//! - **No global state**: CRC policy and safety limits live on each
//!   archive handle
//!
//! ## Quick Start
//!
//! ### Reading a ZIP file
//!
//! ```no_run
//! use c_zip::{Archive, OpenFlags};
//!
//! let mut archive = Archive::open("archive.zip", OpenFlags::read())?;
//!
//! // List all entries
//! for index in 0..archive.num_entries() {
//!     let stat = archive.stat(index)?;
//!     println!("{}: {} bytes", stat.name_lossy(), stat.size);
//! }
//!
//! // Read a specific file
//! let data = archive.read_entry_by_name("file.txt")?;
//! # Ok::<(), c_zip::ZipError>(())
//! ```
//!
//! ### Writing a ZIP file
//!
//! ```no_run
//! use c_zip::{Archive, Method, OpenFlags};
//!
//! let mut archive = Archive::open("output.zip", OpenFlags::create_truncate())?;
//!
//! archive.add("file1.txt", b"Hello, World!".as_slice(), Some(Method::Deflate))?;
//! archive.add("file2.txt", b"Another file".as_slice(), None)?;
//!
//! archive.close()?;
//! # Ok::<(), c_zip::ZipError>(())
//! ```

pub mod archive;
pub mod codec;
pub mod dostime;
pub mod error;
pub mod records;

pub use archive::{Archive, ArchiveOptions, EntryFile, EntryStat, ExpansionGuard, OpenFlags, Source};
pub use codec::{Codec, Decoder, Encoder, Flush, Method, Registry, StreamProgress, StreamStatus};
pub use error::{Result, ZipError};
