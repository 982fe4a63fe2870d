//! Integrity manifest (`checksum.txt`)
//!
//! One entry per line in the format produced by `sha256sum`:
//! ```text
//! <64 hex digits><space><space or '*'><file name>
//! ```
//! Verification is strict: every line must be well formed, every listed file
//! must exist with the listed hash, and every file in the archive directory
//! must be listed.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::files::MANIFEST;

const HASH_HEX_LEN: usize = 64;

/// Reasons an archive fails its integrity check
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Manifest {MANIFEST} is missing")]
    MissingManifest,

    #[error("Malformed manifest line {0}")]
    MalformedLine(usize),

    #[error("File {0} listed more than once")]
    DuplicateEntry(String),

    #[error("Listed file {0} is missing")]
    MissingFile(String),

    #[error("File {0} is not listed in the manifest")]
    UnlistedFile(String),

    #[error("Hash mismatch for {0}")]
    HashMismatch(String),

    #[error("I/O error during verification: {0}")]
    Io(#[from] io::Error),
}

impl IntegrityError {
    /// True when the failure is an I/O fault rather than bad archive content
    pub fn is_io(&self) -> bool {
        matches!(self, IntegrityError::Io(_))
    }
}

/// Hex-encoded SHA-256 of a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex-encoded SHA-256 of a file's content
pub fn hash_file(path: &Path) -> io::Result<String> {
    Ok(hash_bytes(&fs::read(path)?))
}

/// A single manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    /// Lowercase hex digest
    pub hash: String,
}

/// Ordered list of (file name, hash) pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn push(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        let hash: String = hash.into();
        self.entries.push(ManifestEntry {
            name: name.into(),
            hash: hash.to_ascii_lowercase(),
        });
    }

    /// Hash `path` and record it under its file name
    pub fn add_file(&mut self, path: &Path) -> io::Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))?;
        let hash = hash_file(path)?;
        self.push(name, hash);
        Ok(())
    }

    /// Render in `sha256sum` text format
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}  {}\n", e.hash, e.name))
            .collect()
    }

    /// Parse `sha256sum` text, rejecting any malformed line
    pub fn parse(text: &str) -> Result<Self, IntegrityError> {
        let mut manifest = Manifest::new();
        let mut seen = BTreeSet::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let entry = parse_line(line).ok_or(IntegrityError::MalformedLine(line_no))?;

            if !seen.insert(entry.name.clone()) {
                return Err(IntegrityError::DuplicateEntry(entry.name));
            }
            manifest.entries.push(entry);
        }

        Ok(manifest)
    }

    /// Verify the files of a flat archive directory against its manifest
    pub fn verify_dir(dir: &Path) -> Result<VerifiedArchive, IntegrityError> {
        let manifest_path = dir.join(MANIFEST);
        let text = match fs::read_to_string(&manifest_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IntegrityError::MissingManifest)
            }
            // A manifest that is not text cannot be well formed
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(IntegrityError::MalformedLine(1))
            }
            Err(e) => return Err(e.into()),
        };
        let manifest = Manifest::parse(&text)?;

        let mut present = BTreeSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != MANIFEST {
                present.insert(name);
            }
        }

        for entry in &manifest.entries {
            if !present.contains(&entry.name) {
                return Err(IntegrityError::MissingFile(entry.name.clone()));
            }
            if hash_file(&dir.join(&entry.name))? != entry.hash {
                return Err(IntegrityError::HashMismatch(entry.name.clone()));
            }
        }

        let listed: BTreeSet<&str> = manifest.entries.iter().map(|e| e.name.as_str()).collect();
        if let Some(extra) = present.iter().find(|name| !listed.contains(name.as_str())) {
            return Err(IntegrityError::UnlistedFile(extra.clone()));
        }

        Ok(VerifiedArchive {
            dir: dir.to_path_buf(),
            files: manifest.entries.into_iter().map(|e| e.name).collect(),
        })
    }
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    if line.len() < HASH_HEX_LEN + 3 || !line.is_char_boundary(HASH_HEX_LEN) {
        return None;
    }
    let (hash, rest) = line.split_at(HASH_HEX_LEN);
    if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let name = rest
        .strip_prefix("  ")
        .or_else(|| rest.strip_prefix(" *"))?;
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name == MANIFEST {
        return None;
    }

    Some(ManifestEntry {
        name: name.to_string(),
        hash: hash.to_ascii_lowercase(),
    })
}

/// An archive directory whose content matched its manifest
#[derive(Debug, Clone)]
pub struct VerifiedArchive {
    dir: PathBuf,
    files: Vec<String>,
}

impl VerifiedArchive {
    /// Names of the verified files, manifest order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }

    /// Path of a verified file, if the archive carries it
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.contains(name).then(|| self.dir.join(name))
    }
}
