//! Requests, tickets and outcomes exchanged with the fetch driver.

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::FetchError;

/// Why a request ended without bytes to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// A newer request for the same key replaced this one while queued.
    Superseded,
    /// The upstream answered with a non-200 status.
    UpstreamMiss(u16),
    /// The transfer or the cache write failed.
    Failed,
    /// The fetch queue shut down before the request was served.
    Closed,
}

/// Final answer to a [`FetchTicket`].
pub enum FetchOutcome {
    /// The upstream answered 200 and its body is being streamed.
    Streaming(FetchStream),
    /// The file was already on disk when the fetch was admitted.
    Cached(PathBuf),
    /// There is nothing to serve.
    NotFound(NotFoundReason),
}

impl fmt::Debug for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming(stream) => f.debug_tuple("Streaming").field(stream).finish(),
            Self::Cached(path) => f.debug_tuple("Cached").field(path).finish(),
            Self::NotFound(reason) => f.debug_tuple("NotFound").field(reason).finish(),
        }
    }
}

/// A fetch waiting in, or admitted by, the driver.
pub(crate) struct FetchRequest {
    pub key: String,
    pub token: CancellationToken,
    pub responder: oneshot::Sender<FetchOutcome>,
}

impl FetchRequest {
    /// Delivers `outcome`, ignoring tickets that were already dropped.
    pub fn respond(self, outcome: FetchOutcome) {
        let _ = self.responder.send(outcome);
    }
}

/// Handle to a pending fetch.
///
/// Dropping the ticket cancels the request: a queued request is discarded
/// without a network call, an in-flight request stops streaming to this
/// client but still completes its cache write.
#[must_use = "dropping the ticket cancels the fetch"]
pub struct FetchTicket {
    key: String,
    receiver: oneshot::Receiver<FetchOutcome>,
    guard: Option<DropGuard>,
}

impl FetchTicket {
    pub(crate) fn new(
        key: String,
        receiver: oneshot::Receiver<FetchOutcome>,
        token: CancellationToken,
    ) -> Self {
        Self {
            key,
            receiver,
            guard: Some(token.drop_guard()),
        }
    }

    /// Returns the requested key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the request to be served.
    ///
    /// A streaming outcome takes over the cancellation guard, so dropping
    /// the stream cancels the request from then on.
    pub async fn resolve(mut self) -> FetchOutcome {
        let outcome = (&mut self.receiver)
            .await
            .unwrap_or(FetchOutcome::NotFound(NotFoundReason::Closed));

        match outcome {
            FetchOutcome::Streaming(mut stream) => {
                stream.guard = self.guard.take();
                FetchOutcome::Streaming(stream)
            }
            other => other,
        }
    }
}

impl fmt::Debug for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchTicket")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Body of a fetched asset as it arrives from upstream.
///
/// Chunks are buffered until read, so a slow reader does not delay the
/// cache write. The stream ends after the cache file has been committed.
pub struct FetchStream {
    inner: UnboundedReceiverStream<Result<Bytes, FetchError>>,
    content_length: Option<u64>,
    guard: Option<DropGuard>,
}

impl FetchStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Result<Bytes, FetchError>>,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(receiver),
            content_length,
            guard: None,
        }
    }

    /// Returns the upstream `Content-Length`, when it was announced.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl Stream for FetchStream {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl fmt::Debug for FetchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
