//! Streaming relay.
//!
//! One relay session pairs one upstream byte stream with one client body:
//!
//! ```text
//!  upstream ──► pump task ──► bounded channel ──► RelayBody ──► client
//!                  ▲                                  │
//!                  └──────── CancellationToken ◄──────┘ (dropped on disconnect)
//! ```
//!
//! The pump task owns the upstream stream. The body owns a drop guard for the
//! session's cancellation token, so a client disconnect (hyper dropping the
//! body) cancels the token and the pump drops the upstream stream, closing
//! the upstream connection. The bounded channel provides backpressure; at
//! most `buffer_chunks` chunks are held in memory per session.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use http::header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::error::{GatewayError, RangeError, UpstreamError};
use crate::upstream::{ByteStream, MediaStore};

use super::classify::GENERIC_BINARY_MIME;
use super::range::RelayPlan;
use super::types::{ContentDescriptor, MediaReference, UpstreamLocator};

/// Default number of chunks buffered between upstream and client.
pub const DEFAULT_RELAY_BUFFER_CHUNKS: usize = 8;

/// Default `Cache-Control` max-age for relayed media (one day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86400;

// =============================================================================
// Relay Outcome
// =============================================================================

/// How a relay session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Every planned byte was handed to the client body
    Completed { bytes: u64 },

    /// The client went away first; the upstream stream was closed
    Cancelled { bytes: u64 },

    /// Upstream failed or ended early after headers were sent; the client
    /// sees a truncated transfer
    Terminated { bytes: u64, reason: String },
}

// =============================================================================
// Byte Window
// =============================================================================

/// Trims an upstream stream to the bytes the plan promised the client.
///
/// Needed when the upstream ignored a forwarded range (answered 200 with the
/// whole object) and to keep full-object relays from overrunning the
/// advertised `Content-Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteWindow {
    skip: u64,
    remaining: Option<u64>,
}

impl ByteWindow {
    fn for_plan(plan: RelayPlan, descriptor: &ContentDescriptor, range_applied: bool) -> Self {
        match plan {
            RelayPlan::Partial { start, end } => Self {
                skip: if range_applied { 0 } else { start },
                remaining: Some(end - start + 1),
            },
            RelayPlan::Full | RelayPlan::Unsatisfiable => Self {
                skip: 0,
                remaining: descriptor.total_size,
            },
        }
    }

    fn apply(&mut self, mut chunk: Bytes) -> Option<Bytes> {
        if self.skip > 0 {
            let skipped = self.skip.min(chunk.len() as u64);
            self.skip -= skipped;
            chunk = chunk.slice(skipped as usize..);
        }

        if let Some(remaining) = self.remaining.as_mut() {
            if chunk.len() as u64 > *remaining {
                chunk.truncate(*remaining as usize);
            }
            *remaining -= chunk.len() as u64;
        }

        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }

    fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    fn is_short(&self) -> bool {
        self.skip > 0 || self.remaining.is_some_and(|r| r > 0)
    }
}

// =============================================================================
// Relay Body
// =============================================================================

/// Client-facing half of a relay session.
///
/// Dropping it cancels the session.
pub struct RelayBody {
    rx: mpsc::Receiver<Result<Bytes, io::Error>>,
    _cancel_on_drop: DropGuard,
}

impl Stream for RelayBody {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// =============================================================================
// Relay Session
// =============================================================================

/// Decrements the active relay count when the pump task finishes.
struct ActiveRelay(Arc<AtomicUsize>);

impl ActiveRelay {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveRelay {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Upstream-facing half of a relay session, owned by the pump task.
struct RelaySession {
    upstream: ByteStream,
    window: ByteWindow,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    cancel: CancellationToken,
    _active: ActiveRelay,
}

impl RelaySession {
    async fn run(mut self) -> RelayOutcome {
        let mut sent: u64 = 0;

        loop {
            if self.window.is_exhausted() {
                return RelayOutcome::Completed { bytes: sent };
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayOutcome::Cancelled { bytes: sent },
                next = self.upstream.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return self.terminate(sent, e.to_string()).await,
                None if self.window.is_short() => {
                    return self
                        .terminate(sent, "upstream ended before the planned length".into())
                        .await
                }
                None => return RelayOutcome::Completed { bytes: sent },
            };

            let Some(chunk) = self.window.apply(chunk) else {
                continue;
            };
            let len = chunk.len() as u64;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RelayOutcome::Cancelled { bytes: sent },
                res = self.tx.send(Ok(chunk)) => {
                    if res.is_err() {
                        return RelayOutcome::Cancelled { bytes: sent };
                    }
                }
            }
            sent += len;
        }
    }

    /// End the client body with an error so the transfer is visibly truncated.
    async fn terminate(&mut self, sent: u64, reason: String) -> RelayOutcome {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RelayOutcome::Cancelled { bytes: sent },
            _ = self.tx.send(Err(io::Error::other(reason.clone()))) => {}
        }
        RelayOutcome::Terminated {
            bytes: sent,
            reason,
        }
    }
}

// =============================================================================
// Relay Response
// =============================================================================

/// Response produced by a successful relay (or a HEAD request).
pub struct RelayResponse {
    pub descriptor: ContentDescriptor,
    pub plan: RelayPlan,
    body: Option<RelayBody>,
    cache_max_age: u32,
}

impl RelayResponse {
    /// Response carrying headers only (HEAD requests).
    pub fn headers_only(descriptor: ContentDescriptor, plan: RelayPlan) -> Self {
        Self {
            descriptor,
            plan,
            body: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    fn streaming(descriptor: ContentDescriptor, plan: RelayPlan, body: RelayBody) -> Self {
        Self {
            descriptor,
            plan,
            body: Some(body),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    /// Set the `Cache-Control` max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn status(&self) -> StatusCode {
        match self.plan {
            RelayPlan::Partial { .. } => StatusCode::PARTIAL_CONTENT,
            RelayPlan::Full | RelayPlan::Unsatisfiable => StatusCode::OK,
        }
    }

    /// Response headers for this relay.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let content_type = HeaderValue::from_str(&self.descriptor.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static(GENERIC_BINARY_MIME));
        headers.insert(CONTENT_TYPE, content_type);

        if let Ok(value) = HeaderValue::try_from(format!("public, max-age={}", self.cache_max_age))
        {
            headers.insert(CACHE_CONTROL, value);
        }

        match self.plan {
            RelayPlan::Partial { start, end } => {
                let total = self.descriptor.total_size.unwrap_or(end + 1);
                if let Ok(value) =
                    HeaderValue::try_from(format!("bytes {}-{}/{}", start, end, total))
                {
                    headers.insert(CONTENT_RANGE, value);
                }
                headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start + 1));
            }
            RelayPlan::Full | RelayPlan::Unsatisfiable => {
                if self.descriptor.supports_range {
                    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                    if let Some(total) = self.descriptor.total_size {
                        headers.insert(CONTENT_LENGTH, HeaderValue::from(total));
                    }
                }
            }
        }

        headers
    }

    /// Take the streaming body, if any.
    pub fn into_body(self) -> Option<RelayBody> {
        self.body
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let headers = self.headers();
        let body = match self.body {
            Some(body) => Body::from_stream(body),
            None => Body::empty(),
        };
        (status, headers, body).into_response()
    }
}

// =============================================================================
// Streaming Relay
// =============================================================================

/// Executes relay plans against a media store.
pub struct StreamingRelay<S: MediaStore> {
    store: Arc<S>,
    timeout: Duration,
    buffer_chunks: usize,
    active: Arc<AtomicUsize>,
}

impl<S: MediaStore> StreamingRelay<S> {
    /// Create a relay.
    ///
    /// `timeout` bounds the wait for the first upstream chunk, the last
    /// point at which a failure can still change the response status.
    pub fn new(store: Arc<S>, timeout: Duration, buffer_chunks: usize) -> Self {
        Self {
            store,
            timeout,
            buffer_chunks: buffer_chunks.max(1),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of relay sessions whose pump task is still running.
    pub fn active_relays(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Execute a plan, opening at most one upstream stream.
    pub async fn execute(
        &self,
        media_id: &MediaReference,
        locator: &UpstreamLocator,
        descriptor: ContentDescriptor,
        plan: RelayPlan,
    ) -> Result<RelayResponse, GatewayError> {
        if plan == RelayPlan::Unsatisfiable {
            return Err(GatewayError::Range {
                media_id: media_id.to_string(),
                source: RangeError::Unsatisfiable {
                    total_size: descriptor.total_size.unwrap_or(0),
                },
            });
        }

        let upstream = self
            .store
            .open(locator, plan.byte_range())
            .await
            .map_err(|e| GatewayError::from_upstream(media_id.as_str(), e))?;

        let window = ByteWindow::for_plan(plan, &descriptor, upstream.range_applied);
        let mut stream = upstream.stream;

        // Headers are not committed until the first chunk (or a clean end)
        // has arrived, so failures up to here still become a 500.
        let first = match tokio::time::timeout(self.timeout, stream.next()).await {
            Err(_) => {
                return Err(GatewayError::from_upstream(
                    media_id.as_str(),
                    UpstreamError::Timeout {
                        endpoint: self.store.describe(),
                        timeout: self.timeout,
                    },
                ))
            }
            Ok(Some(Err(e))) => return Err(GatewayError::from_upstream(media_id.as_str(), e)),
            Ok(Some(Ok(chunk))) => Some(chunk),
            Ok(None) => None,
        };

        let upstream: ByteStream = stream::iter(first.map(Ok)).chain(stream).boxed();

        let (tx, rx) = mpsc::channel(self.buffer_chunks);
        let cancel = CancellationToken::new();
        let body = RelayBody {
            rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
        };

        let session = RelaySession {
            upstream,
            window,
            tx,
            cancel,
            _active: ActiveRelay::enter(&self.active),
        };

        let media_id = media_id.to_string();
        tokio::spawn(async move {
            match session.run().await {
                RelayOutcome::Completed { bytes } => {
                    debug!(media_id = %media_id, bytes, "Relay completed");
                }
                RelayOutcome::Cancelled { bytes } => {
                    debug!(
                        media_id = %media_id,
                        bytes,
                        "Client disconnected, upstream stream closed"
                    );
                }
                RelayOutcome::Terminated { bytes, reason } => {
                    warn!(
                        media_id = %media_id,
                        bytes,
                        "Relay terminated mid-stream: {}",
                        reason
                    );
                }
            }
        });

        Ok(RelayResponse::streaming(descriptor, plan, body))
    }
}
