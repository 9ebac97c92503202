//! Server error types.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that end a request with an error status.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// Request path is malformed or tries to leave the served tree.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Neither the file nor a usable gzip variant exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The file could not be rewound after reading its leading bytes.
    #[error("Cannot rewind {name} after content sniffing: {source}")]
    SniffSeek {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Positioning the file at the start of the requested range failed.
    #[error("Cannot seek {name}: {source}")]
    Seek {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The blocking task serving the request panicked or was cancelled.
    #[error("Request task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SniffSeek { .. } | Self::Seek { .. } | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Details stay in the log; clients only see the status line
        let body = format!(
            "{} {}\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        );
        (status, body).into_response()
    }
}
