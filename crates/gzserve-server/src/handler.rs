//! File server request handler.
//!
//! Control flow for a request under a mount:
//!
//! 1. Strip the mount prefix and decode the path
//! 2. Reject paths that try to climb out of the store
//! 3. Redirect explicit `/index.html` requests to their directory
//! 4. Negotiate between the file and its `.gz` variant
//! 5. Fix the trailing slash if the path is not canonical
//! 6. Send the file or directory listing

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use gzserve_storage::path::{clean, has_dot_dot};

use crate::error::ServerError;
use crate::negotiate::negotiate;
use crate::redirect::{canonical_redirect, index_redirect, local_redirect};
use crate::request::RequestContext;
use crate::respond::respond;
use crate::state::Mount;

/// Handle any request routed to a mount.
///
/// Store access is synchronous, so the whole decision runs on the blocking
/// pool.
pub(crate) async fn serve(State(mount): State<Arc<Mount>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    match tokio::task::spawn_blocking(move || serve_parts(&mount, &parts)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => err.into_response(),
        Err(err) => ServerError::Task(err).into_response(),
    }
}

fn serve_parts(mount: &Mount, parts: &Parts) -> Result<Response, ServerError> {
    let full_path = parts.uri.path();
    let query = parts.uri.query();
    let rest = full_path.strip_prefix(mount.prefix.as_str()).unwrap_or(full_path);

    // The bare prefix names the mount's root directory
    if rest.is_empty()
        && let Some(target) = canonical_redirect(&mount.prefix, true)
    {
        return Ok(local_redirect(&target, query));
    }

    let ctx = RequestContext::new(&parts.method, rest, query, &parts.headers, mount.gzip)?;
    if has_dot_dot(&ctx.path) || ctx.path.contains('\0') {
        return Err(ServerError::InvalidPath(ctx.path));
    }

    if let Some(target) = index_redirect(&ctx.path) {
        return Ok(local_redirect(target, ctx.raw_query.as_deref()));
    }

    let name = clean(&ctx.path);
    let decision = negotiate(mount.storage.as_ref(), &name, ctx.accepts_gzip);

    if !decision.is_not_found()
        && let Some(target) = canonical_redirect(&ctx.path, decision.requested_is_dir)
    {
        return Ok(local_redirect(&target, ctx.raw_query.as_deref()));
    }

    tracing::debug!(
        path = %ctx.path,
        accepts_gzip = ctx.accepts_gzip,
        method = %parts.method,
        "Serving request"
    );
    respond(&ctx, &parts.headers, decision)
}
