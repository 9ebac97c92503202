//! Response bodies produced on the blocking pool.
//!
//! Store reads are synchronous, so bodies are generated on a blocking thread
//! and handed to the connection through a bounded channel. The producer
//! blocks while the client is slow and stops once it disconnects.

use std::io;

use axum::body::{Body, Bytes};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Chunks buffered between the producer thread and the connection.
const CHANNEL_CAPACITY: usize = 4;

/// Sending side of a streamed body.
pub(crate) struct Chunks {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Chunks {
    /// Queue a chunk, waiting for room.
    ///
    /// Returns `false` once the receiving side is gone.
    pub(crate) fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.blocking_send(Ok(chunk.into())).is_ok()
    }

    /// End the body with an error.
    pub(crate) fn fail(&self, err: io::Error) {
        let _ = self.tx.blocking_send(Err(err));
    }
}

/// Build a body whose chunks come from `produce` running on the blocking
/// pool.
///
/// Everything `produce` captured is dropped before the body ends.
pub(crate) fn blocking_body<F>(produce: F) -> Body
where
    F: FnOnce(&Chunks) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let chunks = Chunks { tx };
        produce(&chunks);
    });

    Body::from_stream(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let body = blocking_body(|chunks| {
            for word in ["alpha ", "beta ", "gamma"] {
                assert!(chunks.send(word));
            }
        });

        let bytes = body.collect().await.unwrap().to_bytes();

        assert_eq!(&bytes[..], b"alpha beta gamma");
    }

    #[tokio::test]
    async fn test_failure_ends_body_with_error() {
        let body = blocking_body(|chunks| {
            chunks.send("partial");
            chunks.fail(io::Error::other("disk gone"));
        });

        assert!(body.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_body_stops_producer() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let body = blocking_body(move |chunks| {
            let mut sent = 0;
            while chunks.send("x") {
                sent += 1;
            }
            let _ = done_tx.send(sent);
        });

        drop(body);

        let sent = done_rx.await.unwrap();
        assert!(sent <= CHANNEL_CAPACITY);
    }
}
