//! Bind archive packing
//!
//! The payload of a BIND command is a flat directory packed as a gzip
//! compressed tar stream, then base64 encoded (standard alphabet, padded)
//! so it fits on a single protocol line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io;
use std::path::{Component, Path};
use tar::{Archive, Builder, EntryType};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while packing or unpacking an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive entry {0} is not a plain top-level file")]
    UnsupportedEntry(String),

    #[error("Archive contains no file name for an entry")]
    UnnamedEntry,
}

/// Base64 encode a packed archive for the wire
pub fn encode_payload(archive: &[u8]) -> String {
    STANDARD.encode(archive)
}

/// Decode a BIND argument into packed archive bytes
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, ArchiveError> {
    Ok(STANDARD.decode(payload.trim())?)
}

/// Pack every regular file directly under `dir` into a tar.gz stream.
/// Entries are added in name order so the output is reproducible.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let name = entry
                .file_name()
                .into_string()
                .map_err(|n| ArchiveError::UnsupportedEntry(n.to_string_lossy().into_owned()))?;
            names.push(name);
        }
    }
    names.sort();

    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for name in &names {
        builder.append_path_with_name(dir.join(name), name)?;
    }
    let encoder = builder.into_inner()?;
    let packed = encoder.finish()?;

    debug!(files = names.len(), bytes = packed.len(), "packed archive");
    Ok(packed)
}

/// Unpack a tar.gz stream into `dest`.
///
/// Only regular files with a single plain name are accepted. Directory
/// entries naming the archive root are skipped; anything else (nested paths,
/// links, devices) is rejected.
pub fn unpack_into(archive: &[u8], dest: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut archive = Archive::new(GzDecoder::new(archive));
    let mut names = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let entry_type = entry.header().entry_type();

        let components: Vec<Component<'_>> = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();

        if entry_type == EntryType::Directory && components.is_empty() {
            continue;
        }

        let name = match (entry_type, components.as_slice()) {
            (EntryType::Regular | EntryType::Continuous, [Component::Normal(name)]) => name
                .to_str()
                .ok_or(ArchiveError::UnnamedEntry)?
                .to_string(),
            _ => return Err(ArchiveError::UnsupportedEntry(path.display().to_string())),
        };

        entry.unpack(dest.join(&name))?;
        names.push(name);
    }

    debug!(files = names.len(), "unpacked archive");
    Ok(names)
}
