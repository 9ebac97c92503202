//! Serving the bytes of an open file.
//!
//! Handles `Last-Modified`, the date-based conditional headers
//! (`If-Modified-Since`, `If-Unmodified-Since`, `If-Range`) and single byte
//! ranges. The body is streamed from the handle on a blocking thread so large
//! files never sit in memory.

use std::io::SeekFrom;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gzserve_storage::FileHandle;

use crate::error::ServerError;
use crate::request::RequestContext;
use crate::stream;

/// Bytes read from the handle per body chunk.
const CHUNK_SIZE: usize = 32 * 1024;

/// Last second an HTTP date can express (end of year 9999).
const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// An open file ready to be sent.
pub(crate) struct Content {
    /// Logical name, for logging.
    pub(crate) name: String,
    pub(crate) modified: SystemTime,
    pub(crate) size: u64,
    /// Handle positioned at the start of the file.
    pub(crate) handle: Box<dyn FileHandle>,
}

/// Outcome of the `Range` header.
#[derive(Debug, PartialEq, Eq)]
enum ByteRange {
    /// No usable range; send everything.
    Full,
    /// Inclusive `start..=end`.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Outcome of the date preconditions.
#[derive(Debug, PartialEq, Eq)]
enum Precondition {
    Proceed,
    NotModified,
    Failed,
}

/// Send `content` with the given representation headers.
///
/// # Arguments
///
/// * `ctx` - Request context
/// * `request` - Request headers
/// * `headers` - Response headers already decided (`Content-Type`,
///   `Content-Encoding`)
/// * `content` - File to send
pub(crate) fn serve_content(
    ctx: &RequestContext,
    request: &HeaderMap,
    mut headers: HeaderMap,
    mut content: Content,
) -> Result<Response, ServerError> {
    let modified = unix_seconds(content.modified);
    let last_modified = modified.and_then(|_| http_date(content.modified));

    match check_preconditions(ctx, request, modified) {
        Precondition::Proceed => {}
        Precondition::NotModified => {
            return Ok(bodiless(StatusCode::NOT_MODIFIED, last_modified));
        }
        Precondition::Failed => {
            return Ok(bodiless(StatusCode::PRECONDITION_FAILED, last_modified));
        }
    }

    if let Some(value) = last_modified {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let range = if if_range_allows(ctx, request, modified) {
        request
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map_or(ByteRange::Full, |v| parse_range(v, content.size))
    } else {
        ByteRange::Full
    };

    let (status, length) = match range {
        ByteRange::Full => (StatusCode::OK, content.size),
        ByteRange::Partial { start, end } => {
            content
                .handle
                .seek(SeekFrom::Start(start))
                .map_err(|source| ServerError::Seek {
                    name: content.name.clone(),
                    source,
                })?;
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes {start}-{end}/{}", content.size)),
            );
            (StatusCode::PARTIAL_CONTENT, end - start + 1)
        }
        ByteRange::Unsatisfiable => {
            tracing::debug!(path = %content.name, size = content.size, "Range not satisfiable");
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(
                    header::CONTENT_RANGE,
                    header_value(&format!("bytes */{}", content.size)),
                )],
                "416 Range Not Satisfiable\n",
            )
                .into_response());
        }
    };

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    let body = if ctx.is_head || length == 0 {
        Body::empty()
    } else {
        stream_body(content.handle, length)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Response without a body, keeping only `Last-Modified`.
fn bodiless(status: StatusCode, last_modified: Option<HeaderValue>) -> Response {
    let mut response = status.into_response();
    if let Some(value) = last_modified {
        response.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    response
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Whole seconds since the Unix epoch, or `None` for unknown times.
///
/// The epoch itself counts as unknown: stores report it when they have no
/// modification time.
fn unix_seconds(time: SystemTime) -> Option<i64> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    if secs == 0 {
        return None;
    }
    i64::try_from(secs).ok()
}

/// Format a time as an IMF-fixdate header value.
fn http_date(time: SystemTime) -> Option<HeaderValue> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    if secs > MAX_HTTP_DATE_SECS {
        return None;
    }
    HeaderValue::from_str(&httpdate::fmt_http_date(time)).ok()
}

/// Parse an HTTP date in any of the three formats clients may send.
fn parse_http_date(value: &str) -> Option<i64> {
    let time = httpdate::parse_http_date(value.trim()).ok()?;
    i64::try_from(time.duration_since(UNIX_EPOCH).ok()?.as_secs()).ok()
}

fn header_date(request: &HeaderMap, name: header::HeaderName) -> Option<i64> {
    request
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// Evaluate `If-Unmodified-Since` and `If-Modified-Since`.
///
/// Unparseable dates and unknown modification times disable the check.
fn check_preconditions(
    ctx: &RequestContext,
    request: &HeaderMap,
    modified: Option<i64>,
) -> Precondition {
    let Some(modified) = modified else {
        return Precondition::Proceed;
    };

    if let Some(since) = header_date(request, header::IF_UNMODIFIED_SINCE)
        && modified > since
    {
        return Precondition::Failed;
    }

    if ctx.is_get_or_head
        && let Some(since) = header_date(request, header::IF_MODIFIED_SINCE)
        && modified <= since
    {
        return Precondition::NotModified;
    }

    Precondition::Proceed
}

/// Whether `If-Range` permits a partial response.
///
/// Only dates are supported; an entity tag never matches because no tags are
/// generated.
fn if_range_allows(ctx: &RequestContext, request: &HeaderMap, modified: Option<i64>) -> bool {
    let Some(value) = request.get(header::IF_RANGE) else {
        return true;
    };
    if !ctx.is_get_or_head {
        return true;
    }
    let Some(modified) = modified else {
        return false;
    };
    value
        .to_str()
        .ok()
        .and_then(parse_http_date)
        .is_some_and(|date| date == modified)
}

/// Interpret a `Range` header against a file of `size` bytes.
///
/// Only a single `bytes=` range is honoured; anything else yields the full
/// content.
fn parse_range(value: &str, size: u64) -> ByteRange {
    let Some(set) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    let mut ranges = set.split(',').map(str::trim).filter(|r| !r.is_empty());
    let (Some(range), None) = (ranges.next(), ranges.next()) else {
        return ByteRange::Full;
    };
    let Some((start, end)) = range.split_once('-') else {
        return ByteRange::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last `n` bytes
        let Ok(suffix) = end.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Partial {
            start: size.saturating_sub(suffix),
            end: size - 1,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return ByteRange::Full,
        }
    };
    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial {
        start,
        end: end.map_or(size - 1, |end| end.min(size - 1)),
    }
}

/// Stream up to `length` bytes from `handle`.
///
/// The handle is dropped when the reader finishes or the client goes away.
fn stream_body(mut handle: Box<dyn FileHandle>, length: u64) -> Body {
    stream::blocking_body(move |chunks| {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut remaining = length;
        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
            match handle.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => {
                    remaining -= n as u64;
                    if !chunks.send(Bytes::copy_from_slice(&buf[..n])) {
                        tracing::debug!("Client went away during body transfer");
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to read file body");
                    chunks.fail(err);
                    break;
                }
            }
        }
        // Close the file before ending the stream
        drop(handle);
    })
}
