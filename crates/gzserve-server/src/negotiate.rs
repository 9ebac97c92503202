//! Choosing between a file and its precompressed `.gz` sibling.
//!
//! For a request path `p` the engine opens `p` and, when the client accepts
//! gzip, `p.gz`. The `.gz` file wins unless it is strictly older than `p`.
//! At most two handles are open at once and the losing one is dropped as
//! soon as the choice is made.

use std::time::SystemTime;

use gzserve_storage::{FileHandle, FileStat, Storage};

/// Suffix of precompressed variants.
const GZIP_SUFFIX: &str = ".gz";

/// Page served in place of a directory when present.
const INDEX_FILE: &str = "index.html";

/// An open file together with the metadata it was compared by.
pub(crate) struct Candidate {
    /// Logical path the candidate was opened under.
    name: String,
    stat: FileStat,
    handle: Box<dyn FileHandle>,
}

impl Candidate {
    /// Open `name`, treating any failure as absence.
    fn open(storage: &dyn Storage, name: &str) -> Option<Self> {
        let handle = match storage.open(name) {
            Ok(handle) => handle,
            Err(err) => {
                if !err.is_not_found() {
                    tracing::debug!(path = name, error = %err, "Treating unreadable file as absent");
                }
                return None;
            }
        };
        match handle.stat() {
            Ok(stat) => Some(Self {
                name: name.to_owned(),
                stat,
                handle,
            }),
            Err(err) => {
                tracing::debug!(path = name, error = %err, "Treating unstattable file as absent");
                None
            }
        }
    }
}

/// What the request resolved to.
pub(crate) enum Outcome {
    NotFound,
    /// A directory without an index page.
    Directory {
        name: String,
        handle: Box<dyn FileHandle>,
    },
    /// A regular file, possibly the gzip variant of `name`.
    File {
        /// Name used for content type resolution (never the `.gz` name when
        /// `gzip` is set).
        name: String,
        modified: SystemTime,
        size: u64,
        handle: Box<dyn FileHandle>,
        /// Body bytes are gzip-compressed.
        gzip: bool,
    },
}

/// Result of negotiation, consumed once by the responder.
pub(crate) struct Decision {
    /// The requested path itself is a directory (before index substitution).
    pub(crate) requested_is_dir: bool,
    pub(crate) outcome: Outcome,
}

impl Decision {
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self.outcome, Outcome::NotFound)
    }
}

/// Whether looking for a `.gz` sibling makes sense for `plain`.
///
/// Directories and files that are already gzip archives never get one.
pub(crate) fn can_try_gzip(plain: Option<&FileStat>) -> bool {
    plain.is_none_or(|stat| !stat.is_dir && !has_gzip_suffix(&stat.name))
}

/// Whether the gzip variant should be served instead of the plain file.
///
/// The variant is stale only when it is strictly older; ties favor gzip.
pub(crate) fn should_use_gzip(plain: Option<SystemTime>, gz: SystemTime) -> bool {
    plain.is_none_or(|plain| plain <= gz)
}

fn has_gzip_suffix(name: &str) -> bool {
    name.len() >= GZIP_SUFFIX.len()
        && name.as_bytes()[name.len() - GZIP_SUFFIX.len()..]
            .eq_ignore_ascii_case(GZIP_SUFFIX.as_bytes())
}

/// Resolve a cleaned logical path to the resource that should be served.
///
/// # Arguments
///
/// * `storage` - Store to open candidates from
/// * `name` - Cleaned path starting with `/`
/// * `accepts_gzip` - Client accepts gzip and the mount negotiates
pub(crate) fn negotiate(storage: &dyn Storage, name: &str, accepts_gzip: bool) -> Decision {
    let mut name = name.to_owned();
    let mut plain = Candidate::open(storage, &name);
    let requested_is_dir = plain.as_ref().is_some_and(|c| c.stat.is_dir);

    if requested_is_dir {
        let index = format!("{}/{INDEX_FILE}", name.trim_end_matches('/'));
        if let Some(page) = Candidate::open(storage, &index) {
            // Replacing drops the directory handle
            plain = Some(page);
            name = index;
        }
    }

    let gz = if accepts_gzip && can_try_gzip(plain.as_ref().map(|c| &c.stat)) {
        Candidate::open(storage, &format!("{name}{GZIP_SUFFIX}")).filter(|c| !c.stat.is_dir)
    } else {
        None
    };

    let outcome = match (plain, gz) {
        (plain, Some(gz))
            if should_use_gzip(plain.as_ref().map(|c| c.stat.modified), gz.stat.modified) =>
        {
            let exposed = match plain {
                Some(plain) => plain.name,
                None => gz.name[..gz.name.len() - GZIP_SUFFIX.len()].to_owned(),
            };
            tracing::debug!(path = %exposed, "Serving gzip variant");
            Outcome::File {
                name: exposed,
                modified: gz.stat.modified,
                size: gz.stat.size,
                handle: gz.handle,
                gzip: true,
            }
        }
        (Some(plain), gz) => {
            if gz.is_some() {
                tracing::debug!(path = %plain.name, "Gzip variant is stale, serving original");
            }
            if plain.stat.is_dir {
                Outcome::Directory {
                    name: plain.name,
                    handle: plain.handle,
                }
            } else {
                Outcome::File {
                    name: plain.name,
                    modified: plain.stat.modified,
                    size: plain.stat.size,
                    handle: plain.handle,
                    gzip: false,
                }
            }
        }
        (None, _) => Outcome::NotFound,
    };

    Decision {
        requested_is_dir,
        outcome,
    }
}
