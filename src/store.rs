//! Resident file access
//!
//! Every write goes to a temporary file in the target's directory, is synced,
//! then renamed over the target, so a reader never sees a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read/write access to one config document
pub trait DocumentStore {
    /// Current document, `None` when it does not exist yet
    fn read_document(&self) -> io::Result<Option<String>>;

    /// Replace the whole document
    fn write_document(&mut self, text: &str) -> io::Result<()>;
}

/// Document kept in a file on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for FileStore {
    fn read_document(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_document(&mut self, text: &str) -> io::Result<()> {
        write_atomic(&self.path, text.as_bytes())
    }
}

/// Document kept in memory
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub document: Option<String>,
    pub writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_document(text: impl Into<String>) -> Self {
        Self {
            document: Some(text.into()),
            writes: 0,
        }
    }
}

#[cfg(test)]
impl DocumentStore for MemoryStore {
    fn read_document(&self) -> io::Result<Option<String>> {
        Ok(self.document.clone())
    }

    fn write_document(&mut self, text: &str) -> io::Result<()> {
        self.document = Some(text.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Replace `path` with `data` via temp file and rename.
/// An existing target keeps its permission bits.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Copy `src` over `dst` atomically
pub fn copy_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    let data = fs::read(src)?;
    write_atomic(dst, &data)
}

/// Remove a file, treating absence as success.
/// Returns whether a file was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
