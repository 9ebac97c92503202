//! Per-request context.
//!
//! Everything the file server needs from the inbound request is extracted
//! once into a [`RequestContext`] and never modified afterwards.

use axum::http::{HeaderMap, Method, header};
use percent_encoding::percent_decode_str;

use crate::error::ServerError;

/// Request facts derived once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestContext {
    /// Decoded request path relative to the mount, always starting with `/`.
    pub(crate) path: String,
    /// Raw query string (without `?`), carried over into redirects.
    pub(crate) raw_query: Option<String>,
    /// Client declared gzip support and the mount negotiates.
    pub(crate) accepts_gzip: bool,
    /// Conditional request headers only apply to GET and HEAD.
    pub(crate) is_get_or_head: bool,
    /// HEAD responses carry headers only.
    pub(crate) is_head: bool,
}

impl RequestContext {
    /// Build the context for a request.
    ///
    /// # Arguments
    ///
    /// * `method` - Request method
    /// * `path` - Percent-encoded path with the mount prefix already removed
    /// * `raw_query` - Query string, if any
    /// * `headers` - Request headers
    /// * `negotiate` - Whether the mount substitutes gzip variants at all
    pub(crate) fn new(
        method: &Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        negotiate: bool,
    ) -> Result<Self, ServerError> {
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| ServerError::InvalidPath(path.to_owned()))?;
        let path = if decoded.starts_with('/') {
            decoded.into_owned()
        } else {
            format!("/{decoded}")
        };

        Ok(Self {
            path,
            raw_query: raw_query.map(str::to_owned),
            accepts_gzip: negotiate && accepts_gzip(headers),
            is_get_or_head: method == Method::GET || method == Method::HEAD,
            is_head: method == Method::HEAD,
        })
    }
}

/// Check whether `Accept-Encoding` allows a gzip-encoded response.
///
/// `gzip` and `x-gzip` name the encoding directly; `*` covers it when the
/// encoding is not listed. A zero weight refuses the coding.
pub(crate) fn accepts_gzip(headers: &HeaderMap) -> bool {
    let mut gzip_weight: Option<f32> = None;
    let mut wildcard_weight: Option<f32> = None;

    let codings = headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','));

    for coding in codings {
        let mut params = coding.split(';');
        let name = params.next().unwrap_or_default().trim();
        let weight = params
            .filter_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("q")
                    .then(|| value.trim().parse::<f32>().ok())
                    .flatten()
            })
            .next()
            .unwrap_or(1.0);

        if name.eq_ignore_ascii_case("gzip") || name.eq_ignore_ascii_case("x-gzip") {
            gzip_weight = Some(gzip_weight.map_or(weight, |w| w.max(weight)));
        } else if name == "*" {
            wildcard_weight = Some(weight);
        }
    }

    gzip_weight.or(wildcard_weight).is_some_and(|w| w > 0.0)
}
