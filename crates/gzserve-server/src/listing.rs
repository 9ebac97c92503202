//! HTML directory listings.
//!
//! The directory is read in batches and every rendered batch becomes one
//! body chunk, so huge directories never sit in memory.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use gzserve_storage::{DirEntry, FileHandle};
use html_escape::{encode_double_quoted_attribute, encode_quoted_attribute};
use percent_encoding::utf8_percent_encode;

use crate::redirect::PATH_ESCAPE;
use crate::stream;

/// Entries requested from the store per batch.
pub(crate) const LIST_BATCH: usize = 100;

const LIST_START: &str = "<pre>\n";
const LIST_END: &str = "</pre>\n";

/// Render the entries of an open directory as a `<pre>` list of links.
///
/// `emit` receives the opening tag, one chunk per batch in store order and
/// the closing tag; returning `false` stops the listing. A read failure
/// ends the listing with the entries emitted so far.
fn render(name: &str, handle: &mut dyn FileHandle, mut emit: impl FnMut(String) -> bool) {
    if !emit(LIST_START.to_owned()) {
        return;
    }
    loop {
        let batch = match handle.read_dir(LIST_BATCH) {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(path = name, error = %err, "Failed to read directory");
                break;
            }
        };
        if !emit(render_batch(batch)) {
            tracing::debug!(path = name, "Client went away during listing");
            return;
        }
    }
    emit(LIST_END.to_owned());
}

fn render_batch(batch: Vec<DirEntry>) -> String {
    let mut html = String::new();
    for entry in batch {
        let mut label = entry.name;
        if entry.is_dir {
            label.push('/');
        }
        let href = entry_href(&label);
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            encode_double_quoted_attribute(&href),
            encode_quoted_attribute(&label)
        ));
    }
    html
}

/// Relative link to a directory entry.
///
/// Names whose first segment contains `:` are prefixed with `./` so they are
/// not read as a URL scheme.
fn entry_href(label: &str) -> String {
    let encoded = utf8_percent_encode(label, PATH_ESCAPE).to_string();
    let first_segment = label.split('/').next().unwrap_or_default();
    if first_segment.contains(':') {
        format!("./{encoded}")
    } else {
        encoded
    }
}

/// Respond with the listing of an open directory.
///
/// The handle is read on the blocking pool and closed when the listing ends.
pub(crate) fn list(name: String, mut handle: Box<dyn FileHandle>) -> Response {
    let body = stream::blocking_body(move |chunks| {
        render(&name, handle.as_mut(), |chunk| chunks.send(chunk));
        drop(handle);
    });
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

#[cfg(test)]
mod tests {
    use gzserve_storage::{MockStorage, Storage};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Collect every chunk `render` emits for `path`.
    fn chunks(storage: &MockStorage, path: &str) -> Vec<String> {
        let mut handle = storage.open(path).unwrap();
        let mut chunks = Vec::new();
        render(path, handle.as_mut(), |chunk| {
            chunks.push(chunk);
            true
        });
        chunks
    }

    fn html(storage: &MockStorage, path: &str) -> String {
        chunks(storage, path).concat()
    }

    #[test]
    fn test_render_files_and_directories() {
        let storage = MockStorage::new()
            .with_file("/a.txt", "a", 1)
            .with_dir("/sub");

        assert_eq!(
            html(&storage, "/"),
            "<pre>\n<a href=\"a.txt\">a.txt</a>\n<a href=\"sub/\">sub/</a>\n</pre>\n"
        );
    }

    #[test]
    fn test_render_escapes_markup() {
        let storage = MockStorage::new().with_file("/<tag>", "x", 1);

        let html = html(&storage, "/");

        assert!(html.contains("<a href=\"%3Ctag%3E\">&lt;tag&gt;</a>"));
        assert!(!html.contains("<tag>"));
    }

    #[test]
    fn test_render_escapes_quotes_and_ampersands() {
        let storage = MockStorage::new().with_file("/a&b \"c\".txt", "x", 1);

        let html = html(&storage, "/");

        assert!(html.contains("href=\"a&amp;b%20%22c%22.txt\""));
        assert!(html.contains(">a&amp;b &quot;c&quot;.txt</a>"));
    }

    #[test]
    fn test_render_empty_directory() {
        let storage = MockStorage::new().with_dir("/empty");

        assert_eq!(chunks(&storage, "/empty"), vec![LIST_START, LIST_END]);
    }

    #[test]
    fn test_render_many_entries_in_batches() {
        let mut storage = MockStorage::new();
        for i in 0..250 {
            storage = storage.with_file(&format!("/f{i:03}.txt"), "x", 1);
        }

        let chunks = chunks(&storage, "/");

        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0], LIST_START);
        let counts: Vec<usize> = chunks[1..4]
            .iter()
            .map(|c| c.matches("<a href=").count())
            .collect();
        assert_eq!(counts, vec![100, 100, 50]);
        assert!(chunks[1].starts_with("<a href=\"f000.txt\">"));
        assert!(chunks[2].starts_with("<a href=\"f100.txt\">"));
        assert!(chunks[3].ends_with("<a href=\"f249.txt\">f249.txt</a>\n"));
        assert_eq!(chunks[4], LIST_END);
    }

    #[test]
    fn test_render_stops_when_client_leaves() {
        let mut storage = MockStorage::new();
        for i in 0..250 {
            storage = storage.with_file(&format!("/f{i:03}.txt"), "x", 1);
        }
        let mut handle = storage.open("/").unwrap();
        let mut emitted = 0;

        render("/", handle.as_mut(), |_| {
            emitted += 1;
            emitted < 2
        });

        assert_eq!(emitted, 2);
    }

    #[test]
    fn test_render_read_failure_ends_listing() {
        let storage = MockStorage::new().with_file("/a.txt", "a", 1);

        assert_eq!(html(&storage, "/a.txt"), "<pre>\n</pre>\n");
    }

    #[test]
    fn test_entry_href_scheme_like_names() {
        assert_eq!(entry_href("javascript:alert(1)"), "./javascript:alert%281%29");
        assert_eq!(entry_href("plain.txt"), "plain.txt");
    }

    #[tokio::test]
    async fn test_list_streams_batches_in_order() {
        let mut storage = MockStorage::new();
        for i in 0..250 {
            storage = storage.with_file(&format!("/f{i:03}.txt"), "x", 1);
        }
        let handle = storage.open("/").unwrap();

        let response = list("/".to_owned(), handle);

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let mut body = response.into_body();
        let mut frames = Vec::new();
        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame.unwrap().into_data() {
                frames.push(String::from_utf8(data.to_vec()).unwrap());
            }
        }
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], LIST_START);
        assert!(frames[1].starts_with("<a href=\"f000.txt\">"));
        assert!(frames[3].ends_with("f249.txt</a>\n"));
        assert_eq!(frames[4], LIST_END);
        assert_eq!(storage.open_handles(), 0);
    }
}
