//! Canonical URL redirects.
//!
//! Directories are addressed with a trailing slash and files without one.
//! Index pages are addressed through their directory. Targets are relative
//! so they stay correct behind any mount prefix.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const INDEX_SUFFIX: &str = "/index.html";

/// Characters escaped in generated URL paths.
pub(crate) const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Redirect target for a request naming an index page explicitly.
pub(crate) fn index_redirect(path: &str) -> Option<&'static str> {
    path.ends_with(INDEX_SUFFIX).then_some("./")
}

/// Redirect target that fixes the trailing slash of `path`.
///
/// # Arguments
///
/// * `path` - Request path as received (not cleaned)
/// * `is_dir` - The requested path names a directory
pub(crate) fn canonical_redirect(path: &str, is_dir: bool) -> Option<String> {
    let has_slash = path.ends_with('/');
    if is_dir && !has_slash {
        Some(format!("{}/", base_name(path)))
    } else if !is_dir && has_slash {
        Some(format!("../{}", base_name(path)))
    } else {
        None
    }
}

/// Last segment of a slash path, ignoring trailing slashes.
fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Build a 301 response to `target`, preserving the query string.
pub(crate) fn local_redirect(target: &str, raw_query: Option<&str>) -> Response {
    let mut location = utf8_percent_encode(target, PATH_ESCAPE).to_string();
    if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(query);
    }

    tracing::debug!(location = %location, "Redirecting to canonical path");
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_index_redirect() {
        assert_eq!(index_redirect("/docs/index.html"), Some("./"));
        assert_eq!(index_redirect("/index.html"), Some("./"));
        assert_eq!(index_redirect("/docs/index.htm"), None);
        assert_eq!(index_redirect("/docs/myindex.html"), None);
    }

    #[test]
    fn test_directory_without_slash() {
        assert_eq!(canonical_redirect("/docs", true), Some("docs/".to_owned()));
        assert_eq!(
            canonical_redirect("/a/b/guide", true),
            Some("guide/".to_owned())
        );
    }

    #[test]
    fn test_file_with_slash() {
        assert_eq!(
            canonical_redirect("/a/readme.txt/", false),
            Some("../readme.txt".to_owned())
        );
    }

    #[test]
    fn test_canonical_paths_do_not_redirect() {
        assert_eq!(canonical_redirect("/docs/", true), None);
        assert_eq!(canonical_redirect("/", true), None);
        assert_eq!(canonical_redirect("/a.txt", false), None);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/a/b"), "b");
        assert_eq!(base_name("/a/b//"), "b");
        assert_eq!(base_name("/"), "/");
        assert_eq!(base_name(""), ".");
    }

    #[test]
    fn test_local_redirect_preserves_query() {
        let response = local_redirect("./", Some("lang=en&v=2"));

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "./?lang=en&v=2"
        );
    }

    #[test]
    fn test_local_redirect_escapes_target() {
        let response = local_redirect("my docs/", None);

        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "my%20docs/"
        );
    }

    #[test]
    fn test_local_redirect_empty_query() {
        let response = local_redirect("docs/", Some(""));

        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "docs/");
    }
}
