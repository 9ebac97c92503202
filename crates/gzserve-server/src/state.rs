//! Per-mount state.
//!
//! Each mounted file server owns its configuration; nothing is shared
//! between requests except the read-only store.

use std::sync::Arc;

use gzserve_storage::Storage;

/// A file server mounted under a URL prefix.
pub(crate) struct Mount {
    /// URL prefix stripped before path resolution ("" when serving at the
    /// root).
    pub(crate) prefix: String,
    /// Store the mount serves from.
    pub(crate) storage: Arc<dyn Storage>,
    /// Substitute fresh `.gz` variants for gzip-capable clients.
    pub(crate) gzip: bool,
}
