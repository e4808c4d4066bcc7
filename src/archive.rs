//! The ZIP container engine and the public archive API.
//!
//! An [`Archive`] is a handle over one seekable file in read or write
//! mode. Reading locates and validates the end-of-central-directory
//! record, loads the central directory, and extracts entries through
//! the codec registry. Writing appends local headers and payloads as
//! entries are added, then writes the central directory and EOCD at
//! close.
//!
//! All safety policy lives in [`ArchiveOptions`] owned by the handle:
//! the zipbomb expansion guard, strict CRC verification, the default
//! codec method, and the compression level.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec::{decode_into, encode_to_vec, Method, Registry};
use crate::dostime;
use crate::error::{Result, ZipError};
use crate::records::{
    CentralDirHeader, EndOfCentralDir, LocalFileHeader, CDH_SIGNATURE, CDH_SIZE, EOCD_SIGNATURE,
    EOCD_SIZE, LFH_SIZE, VERSION_MADE_BY, VERSION_NEEDED,
};

/// Hard cap on compressed and uncompressed entry sizes (2 GiB).
const MAX_PAYLOAD: u64 = 2 * 1024 * 1024 * 1024;
/// Entry names must fit the 16-bit name-length field.
const MAX_NAME_LEN: usize = 65535;
/// EOCD is 22 bytes and the comment at most 65535: the signature can
/// only live in the trailing 65558 bytes.
const EOCD_SEARCH_SPAN: u64 = 65535 + EOCD_SIZE as u64 + 1;

/// Zipbomb defence: an entry may claim at most
/// `compressed_size * ratio + slack` uncompressed bytes.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionGuard {
    pub ratio: u64,
    pub slack: u64,
}

impl Default for ExpansionGuard {
    fn default() -> Self {
        ExpansionGuard {
            ratio: 1000,
            slack: 1024 * 1024,
        }
    }
}

/// Per-handle policy knobs. No process-wide state: every handle owns
/// its own copy.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    /// Fail extraction on CRC mismatch instead of warning.
    pub verify_crc: bool,
    /// `None` disables the zipbomb guard entirely.
    pub expansion_guard: Option<ExpansionGuard>,
    /// Codec for newly added entries unless the caller overrides it.
    pub default_method: Method,
    /// Codec-specific compression level; negative means the codec's
    /// default.
    pub compression_level: i32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            verify_crc: false,
            expansion_guard: Some(ExpansionGuard::default()),
            default_method: Method::Store,
            compression_level: -1,
        }
    }
}

impl ArchiveOptions {
    pub fn verify_crc(mut self, on: bool) -> Self {
        self.verify_crc = on;
        self
    }

    pub fn disable_expansion_guard(mut self) -> Self {
        self.expansion_guard = None;
        self
    }

    pub fn expansion_guard(mut self, ratio: u64, slack: u64) -> Self {
        self.expansion_guard = Some(ExpansionGuard { ratio, slack });
        self
    }

    pub fn default_method(mut self, method: Method) -> Self {
        self.default_method = method;
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }
}

/// How to open the backing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub create: bool,
    pub exclusive: bool,
    pub truncate: bool,
}

impl OpenFlags {
    /// Open an existing archive read-only.
    pub fn read() -> Self {
        OpenFlags::default()
    }

    /// Create or append: an existing archive keeps its entries and new
    /// ones go after them.
    pub fn create() -> Self {
        OpenFlags {
            create: true,
            ..Default::default()
        }
    }

    /// Create, failing if the file already exists.
    pub fn create_new() -> Self {
        OpenFlags {
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Create, discarding any existing content.
    pub fn create_truncate() -> Self {
        OpenFlags {
            create: true,
            truncate: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

/// One central-directory record held in memory.
#[derive(Debug, Clone)]
struct Entry {
    name: Vec<u8>,
    method: u16,
    dos_time: u16,
    dos_date: u16,
    crc32: u32,
    comp_size: u32,
    uncomp_size: u32,
    local_header_offset: u32,
    external_attrs: u32,
}

/// Metadata snapshot for one entry.
#[derive(Debug, Clone)]
pub struct EntryStat {
    pub index: u64,
    pub name: Vec<u8>,
    pub size: u64,
    pub compressed_size: u64,
    pub method: u16,
    pub crc32: u32,
    pub external_attrs: u32,
    pub header_offset: u64,
    pub dos_time: u16,
    pub dos_date: u16,
}

impl EntryStat {
    /// Entry name as UTF-8, lossily.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Stored modification time.
    pub fn modified(&self) -> chrono::NaiveDateTime {
        dostime::decode_dos_datetime(self.dos_time, self.dos_date)
    }

    /// True if the name marks a directory entry.
    pub fn is_dir(&self) -> bool {
        self.name.last() == Some(&b'/')
    }
}

/// Caller-supplied bytes for [`Archive::add`]. Borrowed sources stay
/// with the caller; owned ones are consumed by the engine.
pub enum Source<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl Source<'_> {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Borrowed(b) => b,
            Source::Owned(v) => v,
        }
    }
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Source::Borrowed(bytes)
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(s: &'a str) -> Self {
        Source::Borrowed(s.as_bytes())
    }
}

impl From<Vec<u8>> for Source<'static> {
    fn from(v: Vec<u8>) -> Self {
        Source::Owned(v)
    }
}

/// An open entry: the fully decoded bytes plus a read cursor. Owns its
/// buffer independently of the archive.
pub struct EntryFile {
    data: Vec<u8>,
    pos: usize,
}

impl EntryFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Read for EntryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A ZIP archive handle.
pub struct Archive {
    file: File,
    mode: Mode,
    entries: Vec<Entry>,
    next_index: u64,
    options: ArchiveOptions,
    registry: Registry,
    finalized: bool,
}

impl Archive {
    /// Open an archive with default options.
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<Archive> {
        Archive::open_with(path, flags, ArchiveOptions::default())
    }

    /// Open an archive.
    ///
    /// Without `create`, the file is opened read-only and must already
    /// be a consistent ZIP. With `create`, the handle is writable:
    /// `exclusive` fails on an existing file, `truncate` discards old
    /// content, and an existing file without `truncate` is opened for
    /// append. `exclusive` and `truncate` together are rejected.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        flags: OpenFlags,
        options: ArchiveOptions,
    ) -> Result<Archive> {
        let path = path.as_ref();
        if flags.exclusive && flags.truncate {
            return Err(ZipError::InvalidArgument(
                "exclusive and truncate cannot be combined",
            ));
        }

        if !flags.create {
            let file = File::open(path).map_err(ZipError::CannotOpen)?;
            let mut archive = Archive {
                file,
                mode: Mode::Read,
                entries: Vec::new(),
                next_index: 0,
                options,
                registry: Registry::builtin(),
                finalized: true,
            };
            let (entries, _) = archive.load_central_directory()?;
            archive.entries = entries;
            archive.next_index = archive.entries.len() as u64;
            return Ok(archive);
        }

        let exists = path.exists();
        if exists && flags.exclusive {
            return Err(ZipError::AlreadyExists(path.display().to_string()));
        }
        let append = exists && !flags.truncate;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(!append)
            .open(path)
            .map_err(ZipError::CannotOpen)?;

        // Drop-finalize stays disarmed until the open succeeds, so a
        // failed append open cannot scribble a directory onto a file
        // that never was an archive.
        let mut archive = Archive {
            file,
            mode: Mode::Write,
            entries: Vec::new(),
            next_index: 0,
            options,
            registry: Registry::builtin(),
            finalized: true,
        };
        if append {
            let (entries, eocd) = archive.load_central_directory()?;
            archive.entries = entries;
            archive.next_index = archive.entries.len() as u64;
            // New local headers and payloads overwrite the old central
            // directory; it is rewritten at close.
            archive
                .file
                .seek(SeekFrom::Start(eocd.cd_offset as u64))
                .map_err(ZipError::IoRead)?;
        }
        archive.finalized = false;
        Ok(archive)
    }

    /// Number of entries in the archive.
    pub fn num_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the default codec method for subsequently added entries.
    pub fn set_default_method(&mut self, method: Method) {
        self.options.default_method = method;
    }

    /// Find an entry by exact byte equality of its name.
    pub fn name_locate(&self, name: impl AsRef<[u8]>) -> Option<u64> {
        let name = name.as_ref();
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|i| i as u64)
    }

    /// The raw name bytes of an entry.
    pub fn entry_name(&self, index: u64) -> Result<&[u8]> {
        self.entry(index).map(|e| e.name.as_slice())
    }

    /// Metadata snapshot for the entry at `index`.
    pub fn stat(&self, index: u64) -> Result<EntryStat> {
        let entry = self.entry(index)?;
        Ok(EntryStat {
            index,
            name: entry.name.clone(),
            size: entry.uncomp_size as u64,
            compressed_size: entry.comp_size as u64,
            method: entry.method,
            crc32: entry.crc32,
            external_attrs: entry.external_attrs,
            header_offset: entry.local_header_offset as u64,
            dos_time: entry.dos_time,
            dos_date: entry.dos_date,
        })
    }

    /// Metadata snapshot for the entry named `name`.
    pub fn stat_name(&self, name: impl AsRef<[u8]>) -> Result<EntryStat> {
        let name = name.as_ref();
        let index = self
            .name_locate(name)
            .ok_or_else(|| ZipError::NotFound(String::from_utf8_lossy(name).into_owned()))?;
        self.stat(index)
    }

    /// Open the entry at `index`: decode it fully and hand back a
    /// cursor over the bytes.
    pub fn open_entry(&mut self, index: u64) -> Result<EntryFile> {
        let data = self.extract(index)?;
        Ok(EntryFile { data, pos: 0 })
    }

    /// Decode the entry at `index` into a vector.
    pub fn read_entry(&mut self, index: u64) -> Result<Vec<u8>> {
        self.extract(index)
    }

    /// Decode the entry named `name` into a vector.
    pub fn read_entry_by_name(&mut self, name: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let name = name.as_ref();
        let index = self
            .name_locate(name)
            .ok_or_else(|| ZipError::NotFound(String::from_utf8_lossy(name).into_owned()))?;
        self.extract(index)
    }

    /// Add an entry and return its index.
    ///
    /// The source is CRC'd, encoded with the selected codec (the
    /// archive default unless `method` overrides it), and appended.
    /// If the encoded payload is not strictly smaller than the input
    /// the entry transparently falls back to STORE, except for codecs
    /// that inherently frame empty input.
    pub fn add<'a>(
        &mut self,
        name: impl AsRef<[u8]>,
        source: impl Into<Source<'a>>,
        method: Option<Method>,
    ) -> Result<u64> {
        if self.mode != Mode::Write {
            return Err(ZipError::ReadOnly);
        }
        let name = name.as_ref();
        if name.len() > MAX_NAME_LEN {
            return Err(ZipError::InvalidArgument("entry name exceeds 65535 bytes"));
        }
        let source = source.into();
        let data = source.as_bytes();

        let method = method.unwrap_or(self.options.default_method);
        let (final_method, payload) = self.encode_payload(data, method)?;
        let crc32 = crc32fast::hash(data);
        let (dos_time, dos_date) = dostime::now_dos_datetime();

        let offset = self.stream_position()?;
        if offset > u32::MAX as u64 {
            return Err(ZipError::InvalidArgument(
                "local header offset exceeds the 32-bit field",
            ));
        }

        let entry = Entry {
            name: name.to_vec(),
            method: final_method.id(),
            dos_time,
            dos_date,
            crc32,
            comp_size: payload.len() as u32,
            uncomp_size: data.len() as u32,
            local_header_offset: offset as u32,
            external_attrs: 0o100644 << 16,
        };
        self.write_local_header(&entry)?;
        self.file.write_all(&payload).map_err(ZipError::IoWrite)?;

        self.entries.push(entry);
        let index = self.next_index;
        self.next_index += 1;
        Ok(index)
    }

    /// Re-encode an existing entry's data at the current write
    /// position. Name, attributes and timestamp are kept; method,
    /// sizes, CRC and offset are updated.
    pub fn replace<'a>(&mut self, index: u64, source: impl Into<Source<'a>>) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(ZipError::ReadOnly);
        }
        let source = source.into();
        let data = source.as_bytes();
        let method_id = self.entry(index)?.method;
        let method = Method::from_id(method_id).ok_or(ZipError::UnsupportedMethod(method_id))?;
        let (final_method, payload) = self.encode_payload(data, method)?;
        let crc32 = crc32fast::hash(data);

        let offset = self.stream_position()?;
        if offset > u32::MAX as u64 {
            return Err(ZipError::InvalidArgument(
                "local header offset exceeds the 32-bit field",
            ));
        }

        {
            let entry = &mut self.entries[index as usize];
            entry.method = final_method.id();
            entry.crc32 = crc32;
            entry.comp_size = payload.len() as u32;
            entry.uncomp_size = data.len() as u32;
            entry.local_header_offset = offset as u32;
        }
        let entry = self.entries[index as usize].clone();
        self.write_local_header(&entry)?;
        self.file.write_all(&payload).map_err(ZipError::IoWrite)?;
        Ok(())
    }

    /// Override the recorded codec method of an existing entry. Only
    /// meaningful before a [`replace`](Archive::replace) re-encodes it.
    pub fn set_file_method(&mut self, index: u64, method: Method) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(ZipError::ReadOnly);
        }
        self.registry.get(method)?;
        self.entry(index)?;
        self.entries[index as usize].method = method.id();
        Ok(())
    }

    /// Finish the archive. In write mode this appends the central
    /// directory and the EOCD record; in read mode it only releases
    /// the handle.
    pub fn close(mut self) -> Result<()> {
        if self.mode == Mode::Write && !self.finalized {
            self.finalize()?;
        }
        Ok(())
    }

    fn entry(&self, index: u64) -> Result<&Entry> {
        self.entries
            .get(index as usize)
            .ok_or_else(|| ZipError::NotFound(format!("index {index}")))
    }

    fn stream_position(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(ZipError::IoRead)
    }

    fn file_size(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::End(0)).map_err(ZipError::IoRead)
    }

    /// Encode `data` with `method`, applying the smaller-or-STORE
    /// fallback.
    fn encode_payload(&self, data: &[u8], method: Method) -> Result<(Method, Vec<u8>)> {
        if data.len() as u64 > MAX_PAYLOAD || data.len() as u64 > u32::MAX as u64 {
            return Err(ZipError::InvalidArgument("entry data exceeds 2 GiB"));
        }
        if method == Method::Store {
            return Ok((Method::Store, data.to_vec()));
        }
        let codec = self.registry.get(method)?;
        let encoded = encode_to_vec(codec, self.options.compression_level, data)?;
        if encoded.len() >= data.len() && !(data.is_empty() && codec.frames_empty_input()) {
            // Not strictly smaller: store raw instead.
            return Ok((Method::Store, data.to_vec()));
        }
        if encoded.len() as u64 > MAX_PAYLOAD {
            return Err(ZipError::InvalidArgument("encoded payload exceeds 2 GiB"));
        }
        Ok((method, encoded))
    }

    fn write_local_header(&mut self, entry: &Entry) -> Result<()> {
        let header = LocalFileHeader {
            version_needed: VERSION_NEEDED,
            flags: 0,
            method: entry.method,
            dos_time: entry.dos_time,
            dos_date: entry.dos_date,
            crc32: entry.crc32,
            compressed_size: entry.comp_size,
            uncompressed_size: entry.uncomp_size,
            name_len: entry.name.len() as u16,
            extra_len: 0,
        };
        self.file
            .write_all(&header.encode(&entry.name))
            .map_err(ZipError::IoWrite)
    }

    /// Locate and validate the EOCD record, scanning the trailing
    /// bytes from high to low.
    ///
    /// A candidate signature is accepted only if its central-directory
    /// offset and size lie inside the file and the first bytes at that
    /// offset carry the central-directory signature. Payloads that
    /// happen to contain the EOCD magic are skipped over this way.
    fn find_eocd(&mut self) -> Result<(u64, EndOfCentralDir)> {
        let file_size = self.file_size()?;
        if file_size < EOCD_SIZE as u64 {
            return Err(ZipError::MalformedArchive("file too small for an archive"));
        }
        let search_len = file_size.min(EOCD_SEARCH_SPAN);
        let search_start = file_size - search_len;
        self.file
            .seek(SeekFrom::Start(search_start))
            .map_err(ZipError::IoRead)?;
        let mut tail = vec![0u8; search_len as usize];
        self.file.read_exact(&mut tail).map_err(ZipError::IoRead)?;

        for i in (0..=(tail.len() - EOCD_SIZE)).rev() {
            if tail[i..i + 4] != EOCD_SIGNATURE.to_le_bytes() {
                continue;
            }
            let eocd = EndOfCentralDir::parse(&tail[i..i + EOCD_SIZE])?;
            let cd_offset = eocd.cd_offset as u64;
            let cd_end = cd_offset + eocd.cd_size as u64;
            if cd_offset > file_size || cd_end > file_size {
                continue;
            }
            if eocd.total_entries > 0 && eocd.cd_size >= 4 {
                self.file
                    .seek(SeekFrom::Start(cd_offset))
                    .map_err(ZipError::IoRead)?;
                let mut sig = [0u8; 4];
                if self.file.read_exact(&mut sig).is_err() {
                    continue;
                }
                if u32::from_le_bytes(sig) != CDH_SIGNATURE {
                    continue;
                }
            }
            return Ok((search_start + i as u64, eocd));
        }
        Err(ZipError::MalformedArchive("end of central directory not found"))
    }

    /// Read and parse the whole central directory.
    fn load_central_directory(&mut self) -> Result<(Vec<Entry>, EndOfCentralDir)> {
        let (_, eocd) = self.find_eocd()?;
        let cd_size = eocd.cd_size as usize;

        self.file
            .seek(SeekFrom::Start(eocd.cd_offset as u64))
            .map_err(ZipError::IoRead)?;
        let mut cd = vec![0u8; cd_size];
        self.file.read_exact(&mut cd).map_err(ZipError::IoRead)?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut off = 0usize;
        for _ in 0..eocd.total_entries {
            if off + CDH_SIZE > cd_size {
                return Err(ZipError::MalformedArchive("central directory truncated"));
            }
            let header = CentralDirHeader::parse(&cd[off..])?;
            let record_len = header.record_len();
            if record_len > (cd_size - off) as u64 {
                return Err(ZipError::MalformedArchive("central directory record overruns"));
            }
            if header.compressed_size as u64 > MAX_PAYLOAD
                || header.uncompressed_size as u64 > MAX_PAYLOAD
            {
                return Err(ZipError::MalformedArchive("entry size exceeds 2 GiB"));
            }

            let name_start = off + CDH_SIZE;
            let name = cd[name_start..name_start + header.name_len as usize].to_vec();

            entries.push(Entry {
                name,
                method: header.method,
                dos_time: header.dos_time,
                dos_date: header.dos_date,
                crc32: header.crc32,
                comp_size: header.compressed_size,
                uncomp_size: header.uncompressed_size,
                local_header_offset: header.local_header_offset,
                external_attrs: header.external_attrs,
            });
            off += record_len as usize;
        }
        Ok((entries, eocd))
    }

    /// Decode one entry into a fresh buffer.
    fn extract(&mut self, index: u64) -> Result<Vec<u8>> {
        let entry = self.entry(index)?.clone();
        let file_size = self.file_size()?;

        if entry.local_header_offset as u64 > file_size {
            return Err(ZipError::MalformedArchive("local header beyond end of file"));
        }
        self.file
            .seek(SeekFrom::Start(entry.local_header_offset as u64))
            .map_err(ZipError::IoRead)?;
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.file.read_exact(&mut lfh_buf).map_err(ZipError::IoRead)?;
        let lfh = LocalFileHeader::parse(&lfh_buf)?;

        // The central directory is authoritative for sizes and CRC;
        // the local header only contributes its variable-length tail.
        let data_offset = entry.local_header_offset as u64
            + LFH_SIZE as u64
            + lfh.name_len as u64
            + lfh.extra_len as u64;
        if data_offset > file_size {
            return Err(ZipError::MalformedArchive("entry data beyond end of file"));
        }
        if entry.comp_size as u64 > MAX_PAYLOAD || entry.uncomp_size as u64 > MAX_PAYLOAD {
            return Err(ZipError::MalformedArchive("entry size exceeds 2 GiB"));
        }
        if data_offset + entry.comp_size as u64 > file_size {
            return Err(ZipError::MalformedArchive("entry payload beyond end of file"));
        }

        // The guard runs before the uncompressed buffer is allocated.
        // With no compressed bytes at all the allowance collapses to
        // the slack, so an empty payload cannot claim a large size.
        if let Some(guard) = self.options.expansion_guard {
            let allowed = entry.comp_size as u64 * guard.ratio + guard.slack;
            if entry.uncomp_size as u64 > allowed {
                return Err(ZipError::ExpansionLimit {
                    declared: entry.uncomp_size as u64,
                    allowed,
                });
            }
        }

        self.file
            .seek(SeekFrom::Start(data_offset))
            .map_err(ZipError::IoRead)?;
        let mut payload = vec![0u8; entry.comp_size as usize];
        self.file.read_exact(&mut payload).map_err(ZipError::IoRead)?;

        let codec = self.registry.get_id(entry.method)?;
        let mut out = Vec::new();
        out.try_reserve_exact(entry.uncomp_size as usize)
            .map_err(|_| ZipError::ResourceExhausted(entry.uncomp_size as usize))?;
        out.resize(entry.uncomp_size as usize, 0);

        // Either direction of disagreement between the payload and the
        // directory's declared size is a structural defect.
        let produced = decode_into(codec, &payload, &mut out).map_err(|err| match err {
            ZipError::CodecBuffer => {
                ZipError::MalformedArchive("decoded size does not match the directory")
            }
            other => other,
        })?;
        if produced != entry.uncomp_size as usize {
            return Err(ZipError::MalformedArchive(
                "decoded size does not match the directory",
            ));
        }

        let computed = crc32fast::hash(&out);
        if computed != entry.crc32 {
            if self.options.verify_crc {
                return Err(ZipError::CrcMismatch {
                    stored: entry.crc32,
                    computed,
                });
            }
            log::warn!(
                "CRC mismatch for '{}': stored 0x{:08x}, computed 0x{:08x}",
                String::from_utf8_lossy(&entry.name),
                entry.crc32,
                computed
            );
        }
        Ok(out)
    }

    /// Write the central directory and EOCD at the current position.
    fn finalize(&mut self) -> Result<()> {
        let cd_offset = self.stream_position()?;
        if cd_offset > u32::MAX as u64 {
            return Err(ZipError::InvalidArgument(
                "central directory offset exceeds the 32-bit field",
            ));
        }
        if self.entries.len() > u16::MAX as usize {
            return Err(ZipError::InvalidArgument(
                "entry count exceeds the 16-bit field",
            ));
        }

        let mut cd_size: u64 = 0;
        for entry in &self.entries {
            let header = CentralDirHeader {
                version_made_by: VERSION_MADE_BY,
                version_needed: VERSION_NEEDED,
                flags: 0,
                method: entry.method,
                dos_time: entry.dos_time,
                dos_date: entry.dos_date,
                crc32: entry.crc32,
                compressed_size: entry.comp_size,
                uncompressed_size: entry.uncomp_size,
                name_len: entry.name.len() as u16,
                extra_len: 0,
                comment_len: 0,
                disk_start: 0,
                internal_attrs: 0,
                external_attrs: entry.external_attrs,
                local_header_offset: entry.local_header_offset,
            };
            let bytes = header.encode(&entry.name);
            cd_size += bytes.len() as u64;
            if cd_size > u32::MAX as u64 {
                return Err(ZipError::InvalidArgument(
                    "central directory size exceeds the 32-bit field",
                ));
            }
            self.file.write_all(&bytes).map_err(ZipError::IoWrite)?;
        }

        let eocd = EndOfCentralDir {
            disk_number: 0,
            cd_start_disk: 0,
            entries_on_disk: self.entries.len() as u16,
            total_entries: self.entries.len() as u16,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment_len: 0,
        };
        self.file.write_all(&eocd.encode()).map_err(ZipError::IoWrite)?;
        self.file.flush().map_err(ZipError::IoWrite)?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        if self.mode == Mode::Write && !self.finalized {
            if let Err(err) = self.finalize() {
                log::warn!("archive dropped without close; finalize failed: {err}");
            }
        }
    }
}
