//! Filesystem storage implementation for gzserve.
//!
//! This crate provides [`FsStorage`], a native-filesystem implementation of the
//! [`Storage`](gzserve_storage::Storage) trait restricted to a single root
//! directory. Logical paths are mapped with
//! [`gzserve_storage::path::resolve`], so a request can never open anything
//! outside the root.
//!
//! # Example
//!
//! ```ignore
//! use gzserve_storage::Storage;
//! use gzserve_storage_fs::FsStorage;
//!
//! let storage = FsStorage::new("public");
//! let mut dir = storage.open("/")?;
//! for entry in dir.read_dir(100)? {
//!     println!("{}{}", entry.name, if entry.is_dir { "/" } else { "" });
//! }
//! ```

use std::fs::{self, File, Metadata, ReadDir};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use gzserve_storage::path::resolve;
use gzserve_storage::{DirEntry, FileHandle, FileStat, Storage, StorageError, StorageErrorKind};

/// Backend identifier for error messages.
const BACKEND: &str = "fs";

/// Filesystem storage rooted at a directory.
///
/// An empty root serves the current working directory.
#[derive(Clone, Debug)]
pub struct FsStorage {
    /// Root directory all logical paths are resolved against.
    root: PathBuf,
}

impl FsStorage {
    /// Create a new filesystem storage.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory that logical `/` maps to
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this storage.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for FsStorage {
    fn open(&self, name: &str) -> Result<Box<dyn FileHandle>, StorageError> {
        let path = resolve(&self.root, name).map_err(|e| e.with_backend(BACKEND))?;

        let metadata = fs::metadata(&path).map_err(|e| io_error(e, &path))?;
        let inner = if metadata.is_dir() {
            Inner::Dir(None)
        } else {
            Inner::File(File::open(&path).map_err(|e| io_error(e, &path))?)
        };

        tracing::trace!(path = %path.display(), is_dir = metadata.is_dir(), "Opened entry");
        Ok(Box::new(FsHandle {
            path,
            metadata,
            inner,
        }))
    }
}

/// Create a storage error from an I/O error, logging anything unexpected.
fn io_error(err: io::Error, path: &Path) -> StorageError {
    if err.kind() != io::ErrorKind::NotFound {
        tracing::debug!(path = %path.display(), error = %err, "Filesystem access failed");
    }
    StorageError::io(err, path).with_backend(BACKEND)
}

enum Inner {
    File(File),
    /// Directory listing, created on first `read_dir`.
    Dir(Option<ReadDir>),
}

/// Open handle to a file or directory on disk.
struct FsHandle {
    path: PathBuf,
    /// Metadata captured when the handle was opened.
    metadata: Metadata,
    inner: Inner,
}

impl FsHandle {
    fn not_a_file(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("{} is a directory", self.path.display()),
        )
    }
}

impl FileHandle for FsHandle {
    fn stat(&self) -> Result<FileStat, StorageError> {
        Ok(FileStat {
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_dir: self.metadata.is_dir(),
            modified: self.metadata.modified().unwrap_or(UNIX_EPOCH),
            size: self.metadata.len(),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::File(file) => file.read(buf),
            Inner::Dir(_) => Err(self.not_a_file()),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.inner {
            Inner::File(file) => file.seek(pos),
            Inner::Dir(_) => Err(self.not_a_file()),
        }
    }

    fn read_dir(&mut self, max: usize) -> Result<Vec<DirEntry>, StorageError> {
        let Inner::Dir(listing) = &mut self.inner else {
            return Err(StorageError::new(StorageErrorKind::NotADirectory)
                .with_path(&self.path)
                .with_backend(BACKEND));
        };

        if listing.is_none() {
            *listing = Some(fs::read_dir(&self.path).map_err(|e| io_error(e, &self.path))?);
        }
        let Some(entries) = listing.as_mut() else {
            return Ok(Vec::new());
        };

        let limit = if max == 0 { usize::MAX } else { max };
        let mut batch = Vec::new();
        for entry in entries.by_ref().take(limit) {
            let entry = entry.map_err(|e| io_error(e, &self.path))?;
            // Entries whose type cannot be read are listed as plain files
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            batch.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(batch)
    }
}
