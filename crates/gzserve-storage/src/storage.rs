//! Storage traits and error types.
//!
//! Provides the core [`Storage`] and [`FileHandle`] traits for abstracting
//! read-only file access, along with [`StorageError`] for unified error handling
//! across backends.
//!
//! Handles are closed when dropped, so every exit path of a request releases
//! whatever it opened.

use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::time::SystemTime;

/// Snapshot of a file's metadata taken from an open handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    /// Base name of the entry (e.g., "site.css", "" for the store root).
    pub name: String,
    /// True if the entry is a directory.
    pub is_dir: bool,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes (zero for directories on some backends).
    pub size: u64,
}

/// A child entry returned from [`FileHandle::read_dir`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Base name of the child.
    pub name: String,
    /// True if the child is a directory.
    pub is_dir: bool,
}

/// What went wrong, independent of the backend.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Nothing exists at the path.
    NotFound,
    /// The backend refused access.
    PermissionDenied,
    /// The name cannot be mapped into the store (e.g., contains `..`).
    InvalidPath,
    /// A listing was requested on a regular file.
    NotADirectory,
    /// Any other backend failure.
    Other,
}

impl StorageErrorKind {
    fn describe(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::InvalidPath => "invalid path",
            Self::NotADirectory => "not a directory",
            Self::Other => "storage failure",
        }
    }
}

/// Error from a [`Storage`] or [`FileHandle`] operation.
#[derive(Debug)]
pub struct StorageError {
    /// Error category.
    pub kind: StorageErrorKind,
    /// Logical name or backing path the operation was about.
    pub path: Option<PathBuf>,
    /// Short backend tag (e.g., "fs", "mock").
    pub backend: Option<&'static str>,
    source: Option<io::Error>,
}

impl StorageError {
    /// Create an error of the given kind with no context.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            path: None,
            backend: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Shorthand for a `NotFound` error about `path`.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_path(path)
    }

    /// Shorthand for an `InvalidPath` error about `path`.
    #[must_use]
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::InvalidPath).with_path(path)
    }

    /// Whether the entry is simply absent, as opposed to unreadable.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    /// Classify an I/O error from a backing filesystem.
    #[must_use]
    pub fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            io::ErrorKind::NotADirectory => StorageErrorKind::NotADirectory,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidFilename => {
                StorageErrorKind::InvalidPath
            }
            _ => StorageErrorKind::Other,
        };
        Self {
            source: Some(err),
            ..Self::new(kind).with_path(path)
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // "fs: /css/site.css: permission denied (os error 13)"
        if let Some(backend) = self.backend {
            write!(f, "{backend}: ")?;
        }
        if let Some(path) = &self.path {
            write!(f, "{}: ", path.display())?;
        }
        match &self.source {
            Some(source) => write!(f, "{} ({source})", self.kind.describe()),
            None => f.write_str(self.kind.describe()),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

/// Read-only file store.
///
/// Implementations map logical slash paths to their backing storage and hand
/// out exclusively owned handles. A store holds no per-request state, so one
/// instance is shared by every request.
pub trait Storage: Send + Sync {
    /// Open a file or directory by logical path (e.g., "/", "/css/site.css").
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with kind `NotFound` if nothing exists at the
    /// path, `InvalidPath` if the name cannot be mapped safely, or another kind
    /// for backend failures.
    fn open(&self, name: &str) -> Result<Box<dyn FileHandle>, StorageError>;
}

/// An open file or directory.
///
/// The capability set is read-only: stat, read, seek and list. Dropping the
/// handle closes it.
pub trait FileHandle: Send {
    /// Return metadata for the open entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot produce metadata.
    fn stat(&self) -> Result<FileStat, StorageError>;

    /// Read bytes into `buf`, returning the number read (0 at end of file).
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move the read cursor, returning the new offset from the start.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Return up to `max` further children of a directory.
    ///
    /// Successive calls continue where the previous one stopped; an empty
    /// vector means the listing is exhausted. Order is backend-defined.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with kind `NotADirectory` for regular files,
    /// or another kind if the listing fails part way.
    fn read_dir(&mut self, max: usize) -> Result<Vec<DirEntry>, StorageError>;
}
