//! Command-line interface for the `czip` utility.
//!
//! The CLI is a thin front-end over the library: it owns argument
//! parsing, entry-name sanitisation, filesystem I/O and the
//! extraction policy; the archive engine stays policy-free apart from
//! the options threaded through [`ArchiveOptions`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use c_zip::codec::deflate::{DeflateCodec, Inflater};
use c_zip::codec::{encode_to_vec, Decoder, Flush, StreamStatus};
use c_zip::{Archive, ArchiveOptions, Method, OpenFlags};

/// Command-line arguments for the czip utility.
#[derive(Parser, Debug)]
#[command(name = "czip")]
#[command(version)]
#[command(about = "Minimal ZIP reader/writer with pluggable compression codecs", long_about = None)]
#[command(after_help = "Examples:\n  \
  czip list archive.zip                 show archive contents\n  \
  czip create out.zip a.txt b.txt -z zstd\n  \
  czip extract archive.zip -d outdir --verify-crc\n  \
  czip gzip notes.txt                   write notes.txt.gz")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive contents
    List {
        archive: PathBuf,
        /// Show CRC, timestamps and compression details
        #[arg(short, long)]
        verbose: bool,
    },
    /// Extract all entries
    Extract {
        archive: PathBuf,
        /// Directory to extract into
        #[arg(short = 'd', long, default_value = ".")]
        dest: PathBuf,
        /// How to treat suspicious entry names
        #[arg(long, value_enum, default_value = "reject")]
        policy: Policy,
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
        /// Fail on CRC mismatch instead of warning
        #[arg(long)]
        verify_crc: bool,
        /// Disable the zipbomb expansion guard (dangerous)
        #[arg(long)]
        ignore_zipbomb: bool,
    },
    /// Create a new archive from files
    Create {
        archive: PathBuf,
        files: Vec<PathBuf>,
        /// Compression method for added entries
        #[arg(short = 'z', long, default_value = "deflate", value_parser = parse_method)]
        method: Method,
    },
    /// Append files to an existing archive
    Append {
        archive: PathBuf,
        files: Vec<PathBuf>,
        /// Compression method for added entries
        #[arg(short = 'z', long, default_value = "deflate", value_parser = parse_method)]
        method: Method,
    },
    /// Compress a single file into gzip framing
    Gzip {
        file: PathBuf,
        /// Output path (default: <file>.gz)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Compression level 0-9
        #[arg(short, long, default_value_t = 6)]
        level: i32,
    },
    /// Decompress a gzip file
    Gunzip {
        file: PathBuf,
        /// Output path (default: <file> without .gz)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Extraction policy for unsafe entry names.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Reject absolute paths, drive roots and escaping ".." components
    Reject,
    /// Drop components that would escape the extraction root
    Strip,
    /// Extract anyway (still confined to the extraction root)
    Allow,
}

fn parse_method(token: &str) -> std::result::Result<Method, String> {
    Method::from_token(token)
        .ok_or_else(|| format!("unknown method '{token}' (store, deflate, zstd, lzma, lz4, brotli, lzfse)"))
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List { archive, verbose } => list(&archive, verbose),
        Command::Extract {
            archive,
            dest,
            policy,
            force,
            verify_crc,
            ignore_zipbomb,
        } => extract(&archive, &dest, policy, force, verify_crc, ignore_zipbomb),
        Command::Create {
            archive,
            files,
            method,
        } => add_files(&archive, &files, method, true),
        Command::Append {
            archive,
            files,
            method,
        } => add_files(&archive, &files, method, false),
        Command::Gzip {
            file,
            output,
            level,
        } => gzip(&file, output.as_deref(), level),
        Command::Gunzip { file, output } => gunzip(&file, output.as_deref()),
    }
}

fn list(path: &Path, verbose: bool) -> Result<()> {
    let archive = Archive::open(path, OpenFlags::read())
        .with_context(|| format!("failed to open {}", path.display()))?;

    for index in 0..archive.num_entries() {
        let stat = archive.stat(index)?;
        let method = Method::from_id(stat.method)
            .map(Method::token)
            .unwrap_or("unknown");
        if verbose {
            println!(
                "{:3}  {:>10}  {:>10}  {:7}  {:08x}  {}  {}",
                stat.index,
                stat.size,
                stat.compressed_size,
                method,
                stat.crc32,
                stat.modified().format("%Y-%m-%d %H:%M"),
                stat.name_lossy()
            );
        } else {
            println!(
                "{:3}  {:>10}  {:7}  {}",
                stat.index,
                stat.size,
                method,
                stat.name_lossy()
            );
        }
    }
    Ok(())
}

fn extract(
    path: &Path,
    dest: &Path,
    policy: Policy,
    force: bool,
    verify_crc: bool,
    ignore_zipbomb: bool,
) -> Result<()> {
    let mut options = ArchiveOptions::default().verify_crc(verify_crc);
    if ignore_zipbomb {
        options = options.disable_expansion_guard();
    }
    let mut archive = Archive::open_with(path, OpenFlags::read(), options)
        .with_context(|| format!("failed to open {}", path.display()))?;

    fs::create_dir_all(dest)
        .with_context(|| format!("cannot create {}", dest.display()))?;

    let mut failures = 0usize;
    for index in 0..archive.num_entries() {
        let stat = archive.stat(index)?;
        let raw_name = stat.name_lossy();

        let relative = match sanitize_entry_path(&raw_name, policy) {
            Some(p) => p,
            None => {
                eprintln!("skipping suspicious entry: {raw_name}");
                continue;
            }
        };
        let target = dest.join(&relative);

        if stat.is_dir() {
            ensure_parent_dirs(&target, policy)
                .with_context(|| format!("cannot create directories for {raw_name}"))?;
            if let Err(err) = fs::create_dir(&target) {
                if err.kind() != std::io::ErrorKind::AlreadyExists {
                    bail!("failed to create directory {}: {err}", target.display());
                }
            }
            continue;
        }

        let data = match archive.read_entry(index) {
            Ok(data) => data,
            Err(err) => {
                eprintln!("could not read entry {raw_name}: {err}");
                failures += 1;
                continue;
            }
        };

        ensure_parent_dirs(&target, policy)
            .with_context(|| format!("cannot create directories for {raw_name}"))?;
        match write_entry_file(&target, &data, stat.external_attrs, force, policy) {
            Ok(true) => println!("extracted {} ({} bytes)", target.display(), data.len()),
            Ok(false) => {}
            Err(err) => {
                eprintln!("failed to write {}: {err}", target.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} entr{} failed to extract", if failures == 1 { "y" } else { "ies" });
    }
    Ok(())
}

/// Normalise a stored entry name into a safe relative path, resolving
/// `.` and `..` lexically. Absolute paths and drive-letter roots are
/// never accepted; what happens to a leading `..` depends on the
/// policy.
pub fn sanitize_entry_path(name: &str, policy: Policy) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    match policy {
                        Policy::Reject => return None,
                        // Both remaining policies keep extraction
                        // under the destination root.
                        Policy::Strip | Policy::Allow => {}
                    }
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    let mut path = PathBuf::new();
    for segment in segments {
        path.push(segment);
    }
    Some(path)
}

/// Create every missing ancestor of `target`, refusing to walk
/// through symlinks under the reject policy.
fn ensure_parent_dirs(target: &Path, policy: Policy) -> Result<()> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    let mut current = PathBuf::new();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    if policy == Policy::Reject {
                        bail!("refusing to traverse symlink {}", current.display());
                    }
                } else if !meta.is_dir() {
                    bail!("{} exists and is not a directory", current.display());
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Err(err) = fs::create_dir(&current) {
                    // Lost a race? Accept it if a directory appeared.
                    if err.kind() != std::io::ErrorKind::AlreadyExists
                        || !fs::symlink_metadata(&current).map(|m| m.is_dir()).unwrap_or(false)
                    {
                        bail!("cannot create {}: {err}", current.display());
                    }
                }
            }
            Err(err) => bail!("cannot inspect {}: {err}", current.display()),
        }
    }
    Ok(())
}

/// Write one extracted file. Returns false when the entry was skipped
/// because the file exists and `force` is off.
fn write_entry_file(
    target: &Path,
    data: &[u8],
    external_attrs: u32,
    force: bool,
    policy: Policy,
) -> Result<bool> {
    let mut open = fs::OpenOptions::new();
    open.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        // Upper 16 bits may carry a Unix mode; never apply
        // SUID/SGID/sticky bits from the archive.
        let mode = (external_attrs >> 16) & 0o777;
        open.mode(if mode == 0 { 0o644 } else { mode });
    }
    #[cfg(not(unix))]
    let _ = external_attrs;

    let mut file = match open.open(target) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if !force {
                eprintln!(
                    "skipping existing file (use --force to overwrite): {}",
                    target.display()
                );
                return Ok(false);
            }
            let meta = fs::symlink_metadata(target)?;
            if meta.file_type().is_symlink() && policy == Policy::Reject {
                bail!("refusing to overwrite symlink {}", target.display());
            }
            fs::OpenOptions::new().write(true).truncate(true).open(target)?
        }
        Err(err) => return Err(err.into()),
    };

    // Make sure the handle did not land on a device or other
    // non-regular file through a pre-existing path.
    if !file.metadata()?.is_file() {
        bail!("refusing to write non-regular file {}", target.display());
    }
    file.write_all(data)?;
    Ok(true)
}

fn add_files(path: &Path, files: &[PathBuf], method: Method, truncate: bool) -> Result<()> {
    if files.is_empty() {
        bail!("no input files given");
    }
    let flags = if truncate {
        OpenFlags::create_truncate()
    } else {
        OpenFlags::create()
    };
    let options = ArchiveOptions::default().default_method(method);
    let mut archive = Archive::open_with(path, flags, options)
        .with_context(|| format!("failed to open {}", path.display()))?;

    for file in files {
        let data = fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
        let name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?
            .to_string_lossy()
            .into_owned();
        let size = data.len();
        archive
            .add(name.as_bytes(), data, None)
            .with_context(|| format!("failed to add {name}"))?;
        println!("added {name} ({size} bytes)");
    }
    archive.close()?;
    Ok(())
}

fn gzip(input: &Path, output: Option<&Path>, level: i32) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("cannot read {}", input.display()))?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(gz_extension(input)));

    let body = encode_to_vec(&DeflateCodec::default(), level, &data)?;

    let mtime = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let mut framed = Vec::with_capacity(body.len() + 18);
    framed.extend_from_slice(&[0x1f, 0x8b, 8, 0]);
    framed.extend_from_slice(&mtime.to_le_bytes());
    framed.extend_from_slice(&[0, 3]); // xfl, os = unix
    framed.extend_from_slice(&body);
    framed.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
    framed.extend_from_slice(&(data.len() as u32).to_le_bytes());

    fs::write(&output, framed).with_context(|| format!("cannot write {}", output.display()))?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        output.display(),
        data.len(),
        fs::metadata(&output)?.len()
    );
    Ok(())
}

fn gz_extension(input: &Path) -> String {
    match input.extension() {
        Some(ext) => format!("{}.gz", ext.to_string_lossy()),
        None => "gz".to_string(),
    }
}

fn gunzip(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("cannot read {}", input.display()))?;
    if data.len() < 18 {
        bail!("{} is too short to be a gzip file", input.display());
    }
    let output = match output {
        Some(p) => p.to_path_buf(),
        None => {
            if input.extension().map(|e| e == "gz").unwrap_or(false) {
                input.with_extension("")
            } else {
                bail!("cannot derive output name; pass --output");
            }
        }
    };

    // The trailer carries CRC-32 and the length modulo 2^32.
    let isize_hint =
        u32::from_le_bytes([data[data.len() - 4], data[data.len() - 3], data[data.len() - 2], data[data.len() - 1]]);
    let stored_crc =
        u32::from_le_bytes([data[data.len() - 8], data[data.len() - 7], data[data.len() - 6], data[data.len() - 5]]);

    let decoded = gunzip_bytes(&data, isize_hint as usize)?;
    let computed = crc32fast::hash(&decoded);
    if computed != stored_crc {
        bail!("gzip CRC mismatch (stored 0x{stored_crc:08x}, computed 0x{computed:08x})");
    }
    if decoded.len() as u32 != isize_hint {
        bail!("gzip length field does not match decoded size");
    }

    fs::write(&output, &decoded).with_context(|| format!("cannot write {}", output.display()))?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        output.display(),
        data.len(),
        decoded.len()
    );
    Ok(())
}

/// Decode a gzip stream with the standalone DEFLATE decoder, growing
/// the output until end-of-stream.
fn gunzip_bytes(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut decoder = Inflater::new(16 + 15)?;
    let mut out = vec![0u8; size_hint.max(64)];
    let mut consumed = 0;
    let mut produced = 0;
    loop {
        let progress = decoder.process(&data[consumed..], &mut out[produced..], Flush::Finish)?;
        consumed += progress.consumed;
        produced += progress.produced;
        match progress.status {
            StreamStatus::End => {
                out.truncate(produced);
                return Ok(out);
            }
            StreamStatus::More => {
                if produced == out.len() {
                    let grow = (out.len() / 2).max(64);
                    out.resize(out.len() + grow, 0);
                } else if progress.consumed == 0 && progress.produced == 0 {
                    bail!("gzip stream stalled before end-of-stream");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_relative_names_pass_every_policy() {
        for policy in [Policy::Reject, Policy::Strip, Policy::Allow] {
            assert_eq!(
                sanitize_entry_path("dir/sub/file.txt", policy),
                Some(PathBuf::from("dir/sub/file.txt"))
            );
        }
    }

    #[test]
    fn absolute_paths_and_drive_roots_never_pass() {
        for policy in [Policy::Reject, Policy::Strip, Policy::Allow] {
            assert_eq!(sanitize_entry_path("/etc/passwd", policy), None);
            assert_eq!(sanitize_entry_path("C:/windows/system32", policy), None);
            assert_eq!(sanitize_entry_path("c:\\boot.ini", policy), None);
        }
    }

    #[test]
    fn backslashes_are_normalised() {
        assert_eq!(
            sanitize_entry_path("dir\\file.txt", Policy::Reject),
            Some(PathBuf::from("dir/file.txt"))
        );
    }

    #[test]
    fn escaping_dotdot_depends_on_policy() {
        assert_eq!(sanitize_entry_path("../../secret", Policy::Reject), None);
        assert_eq!(
            sanitize_entry_path("../../secret", Policy::Strip),
            Some(PathBuf::from("secret"))
        );
        assert_eq!(
            sanitize_entry_path("../../secret", Policy::Allow),
            Some(PathBuf::from("secret"))
        );
    }

    #[test]
    fn interior_dotdot_resolves_in_place() {
        assert_eq!(
            sanitize_entry_path("a/b/../c.txt", Policy::Reject),
            Some(PathBuf::from("a/c.txt"))
        );
        // Resolving back to the root and below it escapes.
        assert_eq!(sanitize_entry_path("a/../../c.txt", Policy::Reject), None);
    }

    #[test]
    fn dot_segments_and_empty_names_are_dropped() {
        assert_eq!(
            sanitize_entry_path("./a//b/./c", Policy::Reject),
            Some(PathBuf::from("a/b/c"))
        );
        assert_eq!(sanitize_entry_path("", Policy::Reject), None);
        assert_eq!(sanitize_entry_path(".", Policy::Reject), None);
        assert_eq!(sanitize_entry_path("..", Policy::Strip), None);
    }
}
