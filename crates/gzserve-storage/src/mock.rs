//! Mock storage implementation for testing.
//!
//! Provides [`MockStorage`], an in-memory file tree that also records how
//! it was used so tests can assert on open attempts and leaked handles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::path::{clean, has_dot_dot};
use crate::storage::{DirEntry, FileHandle, FileStat, Storage, StorageError, StorageErrorKind};

/// Backend identifier for error messages.
const BACKEND: &str = "mock";

#[derive(Clone, Debug)]
enum Node {
    File { content: Arc<[u8]>, modified: SystemTime },
    Dir { modified: SystemTime },
}

/// Convert seconds since Unix epoch into a [`SystemTime`].
fn mtime(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Base name of a cleaned logical path ("" for the root).
fn base_name(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, last)| last)
}

/// Mock storage for testing.
///
/// Stores files and directories in memory. Use the builder methods to
/// configure the mock with test data; parent directories are created
/// implicitly.
///
/// # Example
///
/// ```ignore
/// use gzserve_storage::{MockStorage, Storage};
///
/// let storage = MockStorage::new()
///     .with_file("/app.js", "console.log(1);", 100)
///     .with_file("/app.js.gz", [0x1f, 0x8b], 100);
///
/// let handle = storage.open("/app.js").unwrap();
/// assert_eq!(storage.open_count("/app.js"), 1);
/// ```
#[derive(Debug)]
pub struct MockStorage {
    nodes: RwLock<BTreeMap<String, Node>>,
    unseekable: RwLock<HashSet<String>>,
    open_counts: RwLock<HashMap<String, usize>>,
    live_handles: Arc<AtomicUsize>,
}

impl Default for MockStorage {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_owned(),
            Node::Dir {
                modified: UNIX_EPOCH,
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            unseekable: RwLock::new(HashSet::new()),
            open_counts: RwLock::new(HashMap::new()),
            live_handles: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockStorage {
    /// Create a new mock storage containing only the root directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with content and modification time.
    ///
    /// # Arguments
    ///
    /// * `path` - Logical path (e.g., "/css/site.css")
    /// * `content` - File bytes
    /// * `mtime_secs` - Modification time as seconds since Unix epoch
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_file(self, path: &str, content: impl AsRef<[u8]>, mtime_secs: u64) -> Self {
        let key = clean(path);
        self.insert_parents(&key);
        self.nodes.write().unwrap().insert(
            key,
            Node::File {
                content: Arc::from(content.as_ref()),
                modified: mtime(mtime_secs),
            },
        );
        self
    }

    /// Add an empty directory.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        let key = clean(path);
        self.insert_parents(&key);
        self.nodes
            .write()
            .unwrap()
            .entry(key)
            .or_insert(Node::Dir {
                modified: UNIX_EPOCH,
            });
        self
    }

    /// Make every handle opened for `path` fail on seek.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_unseekable(self, path: &str) -> Self {
        self.unseekable.write().unwrap().insert(clean(path));
        self
    }

    /// Number of times `open` was called for `path` (successful or not).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn open_count(&self, path: &str) -> usize {
        self.open_counts
            .read()
            .unwrap()
            .get(&clean(path))
            .copied()
            .unwrap_or(0)
    }

    /// Number of handles currently open (opened and not yet dropped).
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    fn insert_parents(&self, key: &str) {
        let mut nodes = self.nodes.write().unwrap();
        let mut prefix = String::new();
        let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        for segment in segments.iter().take(segments.len().saturating_sub(1)) {
            prefix.push('/');
            prefix.push_str(segment);
            nodes.entry(prefix.clone()).or_insert(Node::Dir {
                modified: UNIX_EPOCH,
            });
        }
    }

    fn children_of(nodes: &BTreeMap<String, Node>, key: &str) -> Vec<DirEntry> {
        let prefix = if key == "/" {
            "/".to_owned()
        } else {
            format!("{key}/")
        };
        nodes
            .iter()
            .filter_map(|(path, node)| {
                let rest = path.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(DirEntry {
                    name: rest.to_owned(),
                    is_dir: matches!(node, Node::Dir { .. }),
                })
            })
            .collect()
    }
}

impl Storage for MockStorage {
    fn open(&self, name: &str) -> Result<Box<dyn FileHandle>, StorageError> {
        if has_dot_dot(name) {
            return Err(StorageError::invalid_path(name).with_backend(BACKEND));
        }
        let key = clean(name);
        *self
            .open_counts
            .write()
            .unwrap()
            .entry(key.clone())
            .or_insert(0) += 1;

        let nodes = self.nodes.read().unwrap();
        let Some(node) = nodes.get(&key) else {
            return Err(StorageError::not_found(name).with_backend(BACKEND));
        };

        let (content, modified, children) = match node {
            Node::File { content, modified } => (Some(Arc::clone(content)), *modified, None),
            Node::Dir { modified } => (None, *modified, Some(Self::children_of(&nodes, &key))),
        };

        Ok(Box::new(MockHandle {
            name: base_name(&key).to_owned(),
            content,
            modified,
            children,
            position: 0,
            dir_cursor: 0,
            seekable: !self.unseekable.read().unwrap().contains(&key),
            _guard: LiveGuard::new(Arc::clone(&self.live_handles)),
        }))
    }
}

/// Counts a handle as live until dropped.
#[derive(Debug)]
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MockHandle {
    name: String,
    content: Option<Arc<[u8]>>,
    modified: SystemTime,
    children: Option<Vec<DirEntry>>,
    position: u64,
    dir_cursor: usize,
    seekable: bool,
    _guard: LiveGuard,
}

impl FileHandle for MockHandle {
    fn stat(&self) -> Result<FileStat, StorageError> {
        Ok(FileStat {
            name: self.name.clone(),
            is_dir: self.children.is_some(),
            modified: self.modified,
            size: self.content.as_ref().map_or(0, |c| c.len() as u64),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(content) = &self.content else {
            return Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"));
        };
        let start = usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(content.len());
        let n = buf.len().min(content.len() - start);
        buf[..n].copy_from_slice(&content[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.seekable {
            return Err(io::Error::other("seek not supported"));
        }
        let len = self.content.as_ref().map_or(0, |c| c.len() as u64);
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        self.position = target;
        Ok(target)
    }

    fn read_dir(&mut self, max: usize) -> Result<Vec<DirEntry>, StorageError> {
        let Some(children) = &self.children else {
            return Err(StorageError::new(StorageErrorKind::NotADirectory)
                .with_path(self.name.clone())
                .with_backend(BACKEND));
        };
        let remaining = &children[self.dir_cursor..];
        let take = if max == 0 {
            remaining.len()
        } else {
            max.min(remaining.len())
        };
        let batch = remaining[..take].to_vec();
        self.dir_cursor += take;
        Ok(batch)
    }
}
