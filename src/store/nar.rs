//! NAR (Nix ARchive) serialization of file trees.
//!
//! Every token is a string: a little-endian u64 length, the bytes, and zero
//! padding up to a multiple of 8. File contents are streamed straight into
//! the sink.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

pub const NAR_MAGIC: &str = "nix-archive-1";

const PADDING: [u8; 8] = [0; 8];

fn padding_for(len: u64) -> usize {
    ((8 - len % 8) % 8) as usize
}

fn write_bytes(sink: &mut dyn Write, bytes: &[u8]) -> io::Result<()> {
    let len = bytes.len() as u64;
    sink.write_all(&len.to_le_bytes())?;
    sink.write_all(bytes)?;
    sink.write_all(&PADDING[..padding_for(len)])
}

fn write_str(sink: &mut dyn Write, s: &str) -> io::Result<()> {
    write_bytes(sink, s.as_bytes())
}

/// Serialize the file tree at `path` into `sink`
pub fn dump_path(path: &Path, sink: &mut dyn Write) -> io::Result<()> {
    write_str(sink, NAR_MAGIC)?;
    dump_node(path, sink)
}

fn dump_node(path: &Path, sink: &mut dyn Write) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    let file_type = metadata.file_type();

    write_str(sink, "(")?;
    write_str(sink, "type")?;

    if file_type.is_symlink() {
        write_str(sink, "symlink")?;
        write_str(sink, "target")?;
        let target = fs::read_link(path)?;
        write_bytes(sink, &os_bytes(target.as_os_str()))?;
    } else if file_type.is_dir() {
        write_str(sink, "directory")?;

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| os_bytes(a).cmp(&os_bytes(b)));

        for name in entries {
            write_str(sink, "entry")?;
            write_str(sink, "(")?;
            write_str(sink, "name")?;
            write_bytes(sink, &os_bytes(&name))?;
            write_str(sink, "node")?;
            dump_node(&path.join(&name), sink)?;
            write_str(sink, ")")?;
        }
    } else if file_type.is_file() {
        write_str(sink, "regular")?;
        if is_executable(&metadata) {
            write_str(sink, "executable")?;
            write_str(sink, "")?;
        }
        write_str(sink, "contents")?;
        dump_contents(path, metadata.len(), sink)?;
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported file type at {}", path.display()),
        ));
    }

    write_str(sink, ")")
}

fn dump_contents(path: &Path, expected_len: u64, sink: &mut dyn Write) -> io::Result<()> {
    let file = fs::File::open(path)?;
    sink.write_all(&expected_len.to_le_bytes())?;

    let copied = io::copy(&mut file.take(expected_len), sink)?;
    if copied != expected_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} changed size while being read", path.display()),
        ));
    }

    sink.write_all(&PADDING[..padding_for(expected_len)])
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    s.to_string_lossy().into_owned().into_bytes()
}
