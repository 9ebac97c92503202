//! Turning a negotiation decision into a response.

use std::io::{self, Read, SeekFrom};

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;
use flate2::read::GzDecoder;
use gzserve_storage::FileHandle;

use crate::content::{self, Content};
use crate::error::ServerError;
use crate::listing;
use crate::negotiate::{Decision, Outcome};
use crate::request::RequestContext;
use crate::sniff::{self, SNIFF_LEN};

/// Respond with whatever the decision selected.
pub(crate) fn respond(
    ctx: &RequestContext,
    request: &HeaderMap,
    decision: Decision,
) -> Result<Response, ServerError> {
    match decision.outcome {
        Outcome::NotFound => Err(ServerError::NotFound(ctx.path.clone())),
        Outcome::Directory { name, handle } => Ok(listing::list(name, handle)),
        Outcome::File {
            name,
            modified,
            size,
            mut handle,
            gzip,
        } => {
            let mut headers = HeaderMap::new();
            if gzip {
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            }
            let content_type = resolve_content_type(&name, handle.as_mut(), gzip)?;
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }

            content::serve_content(
                ctx,
                request,
                headers,
                Content {
                    name,
                    modified,
                    size,
                    handle,
                },
            )
        }
    }
}

/// Determine the content type of `name`, sniffing the handle if needed.
///
/// A gzip-encoded handle is sniffed through a decoder so the type describes
/// the decompressed content. Sniffing leaves the handle rewound to the start;
/// if that fails nothing can be sent.
fn resolve_content_type(
    name: &str,
    handle: &mut dyn FileHandle,
    gzip: bool,
) -> Result<String, ServerError> {
    if let Some(content_type) = sniff::type_by_extension(name) {
        return Ok(content_type);
    }

    let mut buf = [0u8; SNIFF_LEN];
    let len = if gzip {
        read_prefix(GzDecoder::new(HandleReader(&mut *handle)), &mut buf)
    } else {
        read_prefix(HandleReader(&mut *handle), &mut buf)
    };
    let content_type = sniff::detect_content_type(&buf[..len]);
    handle
        .seek(SeekFrom::Start(0))
        .map_err(|source| ServerError::SniffSeek {
            name: name.to_owned(),
            source,
        })?;

    tracing::trace!(path = name, content_type, "Sniffed content type");
    Ok(content_type.to_owned())
}

/// `Read` over a borrowed store handle.
struct HandleReader<'a>(&'a mut dyn FileHandle);

impl Read for HandleReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Fill `buf` from `reader`, stopping early at end of input or on error.
fn read_prefix(mut reader: impl Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use gzserve_storage::{MockStorage, Storage};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_resolve_content_type_by_extension() {
        let storage = MockStorage::new().with_file("/site.css", "body{}", 1);
        let mut handle = storage.open("/site.css").unwrap();

        let content_type = resolve_content_type("/site.css", handle.as_mut(), false).unwrap();

        assert_eq!(content_type, "text/css; charset=utf-8");
        assert_eq!(storage.open_count("/site.css"), 1);
    }

    #[test]
    fn test_resolve_content_type_sniffs_and_rewinds() {
        let storage = MockStorage::new().with_file("/README", "<html><body>", 1);
        let mut handle = storage.open("/README").unwrap();

        let content_type = resolve_content_type("/README", handle.as_mut(), false).unwrap();

        assert_eq!(content_type, "text/html; charset=utf-8");
        let mut buf = [0u8; 6];
        handle.read(&mut buf).unwrap();
        assert_eq!(&buf, b"<html>");
    }

    #[test]
    fn test_resolve_content_type_seek_failure() {
        let storage = MockStorage::new()
            .with_file("/README", "plain words", 1)
            .with_unseekable("/README");
        let mut handle = storage.open("/README").unwrap();

        let err = resolve_content_type("/README", handle.as_mut(), false).unwrap_err();

        assert!(matches!(err, ServerError::SniffSeek { .. }));
    }

    #[test]
    fn test_read_prefix_stops_at_eof() {
        let storage = MockStorage::new().with_file("/short", "abc", 1);
        let mut handle = storage.open("/short").unwrap();
        let mut buf = [0u8; SNIFF_LEN];

        assert_eq!(read_prefix(HandleReader(handle.as_mut()), &mut buf), 3);
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_resolve_content_type_sniffs_decompressed_gzip() {
        let compressed = gzip(b"<!DOCTYPE html><html><body>hi</body></html>");
        let storage = MockStorage::new().with_file("/about.gz", compressed.clone(), 1);
        let mut handle = storage.open("/about.gz").unwrap();

        let content_type = resolve_content_type("/about", handle.as_mut(), true).unwrap();

        assert_eq!(content_type, "text/html; charset=utf-8");
        let mut buf = vec![0u8; compressed.len()];
        assert_eq!(
            read_prefix(HandleReader(handle.as_mut()), &mut buf),
            compressed.len()
        );
        assert_eq!(buf, compressed);
    }

    #[test]
    fn test_resolve_content_type_truncated_gzip() {
        let storage = MockStorage::new().with_file("/LICENSE.gz", [0x1f, 0x8b, 0x08, 0, 0], 1);
        let mut handle = storage.open("/LICENSE.gz").unwrap();

        let content_type = resolve_content_type("/LICENSE", handle.as_mut(), true).unwrap();

        // Nothing decodes, which sniffs as empty text rather than an archive
        assert_eq!(content_type, "text/plain; charset=utf-8");
    }
}
