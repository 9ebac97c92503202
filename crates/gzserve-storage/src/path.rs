//! Logical path helpers.
//!
//! Logical paths are slash-separated and absolute (`/docs/index.html`). Backends
//! use [`resolve`] to map them onto a native root without ever leaving it.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use crate::StorageError;

/// Lexically clean a logical path rooted at `/`.
///
/// Collapses repeated slashes, drops `.` segments and resolves `..` against the
/// preceding segment. `..` never climbs above the root. The result always
/// begins with `/` and has no trailing slash unless it is the root itself.
#[must_use]
pub fn clean(name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }

    if parts.is_empty() {
        "/".to_owned()
    } else {
        let mut cleaned = String::with_capacity(name.len() + 1);
        for part in parts {
            cleaned.push('/');
            cleaned.push_str(part);
        }
        cleaned
    }
}

/// Check whether any segment of `name` is `..`.
///
/// Both `/` and `\` count as separators so Windows-style traversal is caught
/// on every platform.
#[must_use]
pub fn has_dot_dot(name: &str) -> bool {
    name.split(['/', '\\']).any(|segment| segment == "..")
}

/// Map a logical path onto `root`.
///
/// An empty `root` means the current directory.
///
/// # Errors
///
/// Returns an `InvalidPath` [`StorageError`] if `name` contains a `..` segment,
/// a NUL byte, or the native separator on platforms where it is not `/`.
pub fn resolve(root: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let illegal_separator = MAIN_SEPARATOR != '/' && name.contains(MAIN_SEPARATOR);
    if illegal_separator || name.contains('\0') || has_dot_dot(name) {
        tracing::debug!(name, "Rejected logical path");
        return Err(StorageError::invalid_path(name));
    }

    let mut resolved = if root.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        root.to_path_buf()
    };
    for segment in clean(name).split('/').filter(|s| !s.is_empty()) {
        resolved.push(segment);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::StorageErrorKind;

    #[test]
    fn test_clean_root() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("//"), "/");
    }

    #[test]
    fn test_clean_collapses_slashes_and_dots() {
        assert_eq!(clean("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean("a/b"), "/a/b");
    }

    #[test]
    fn test_clean_resolves_parent_segments() {
        assert_eq!(clean("/a/b/../c"), "/a/c");
        assert_eq!(clean("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(clean("/a/.."), "/");
    }

    #[test]
    fn test_has_dot_dot() {
        assert!(has_dot_dot("/.."));
        assert!(has_dot_dot("/a/../b"));
        assert!(has_dot_dot("..\\windows"));
        assert!(!has_dot_dot("/a..b/c"));
        assert!(!has_dot_dot("/.hidden/..."));
    }

    #[test]
    fn test_resolve_joins_segments() {
        let resolved = resolve(Path::new("/srv/site"), "/css//./site.css").unwrap();

        assert_eq!(resolved, PathBuf::from("/srv/site/css/site.css"));
    }

    #[test]
    fn test_resolve_root_name() {
        let resolved = resolve(Path::new("/srv/site"), "/").unwrap();

        assert_eq!(resolved, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_resolve_empty_root_is_current_dir() {
        let resolved = resolve(Path::new(""), "/index.html").unwrap();

        assert_eq!(resolved, PathBuf::from("./index.html"));
    }

    #[test]
    fn test_resolve_rejects_parent_segments() {
        for name in ["/..", "/../etc/passwd", "/a/../../b", "/a/..\\..\\b"] {
            let err = resolve(Path::new("/srv/site"), name).unwrap_err();
            assert_eq!(err.kind, StorageErrorKind::InvalidPath, "{name}");
        }
    }

    #[test]
    fn test_resolve_rejects_nul() {
        let err = resolve(Path::new("/srv/site"), "/a\0b").unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::InvalidPath);
    }

    #[cfg(windows)]
    #[test]
    fn test_resolve_rejects_native_separator() {
        let err = resolve(Path::new("C:\\site"), "/a\\b").unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::InvalidPath);
    }
}
