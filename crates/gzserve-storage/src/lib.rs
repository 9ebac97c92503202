//! Read-only file store abstraction for gzserve.
//!
//! This crate provides the [`Storage`] and [`FileHandle`] traits the server
//! consumes to open files and directories by logical path. Keeping the store
//! behind a trait enables:
//!
//! - **Unit testing** the negotiation logic without touching the real filesystem
//! - **Backend flexibility** (native filesystem, in-memory trees, archives)
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Storage`] trait with a single `open()` method
//! - [`FileHandle`] trait with `stat()`, `read()`, `seek()` and `read_dir()`
//! - [`path`] helpers that clean logical paths and root them safely
//! - [`MockStorage`] for testing (behind `mock` feature flag)
//!
//! # Logical Paths
//!
//! All names passed to [`Storage::open`] are slash-separated logical paths
//! beginning with `/` (e.g., `"/"`, `"/css/site.css"`), independent of the
//! native path separator.
//!
//! # Example
//!
//! ```ignore
//! use gzserve_storage::Storage;
//! use gzserve_storage_fs::FsStorage;
//!
//! let storage = FsStorage::new("public");
//! let mut handle = storage.open("/index.html")?;
//! let stat = handle.stat()?;
//! println!("{} bytes, modified {:?}", stat.size, stat.modified);
//! ```

#[cfg(feature = "mock")]
mod mock;
pub mod path;
mod storage;

#[cfg(feature = "mock")]
pub use mock::MockStorage;
pub use storage::{DirEntry, FileHandle, FileStat, Storage, StorageError, StorageErrorKind};
