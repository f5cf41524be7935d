//! Upstream media stores.
//!
//! A [`MediaStore`] knows how to turn a media identifier into a locator and
//! how to open a byte stream for that locator. Resolution is split into two
//! sub-operations:
//!
//! ```text
//! lookup(id)        ──► locator + whatever metadata the index call returns
//! probe(locator)    ──► size / content type confirmed against the object
//! open(locator, r)  ──► byte stream, optionally for a sub-range
//! ```
//!
//! The resolver only calls `probe` when `lookup` left something unknown.

mod http_store;
mod s3_store;

pub use http_store::{HttpMediaStore, DEFAULT_UPSTREAM_URL};
pub use s3_store::{create_s3_client, S3MediaStore};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::UpstreamError;
use crate::media::{ByteRange, MediaReference, UpstreamLocator};

/// Stream of chunks read from the upstream store.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Result of the metadata lookup for an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub locator: UpstreamLocator,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// Object facts confirmed by a probe call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// An opened upstream byte stream.
pub struct UpstreamBody {
    pub stream: ByteStream,

    /// Whether the store honored the forwarded range. When `false` the stream
    /// starts at byte 0 and the relay trims it itself.
    pub range_applied: bool,
}

/// Trait for stores the gateway can relay media from.
///
/// Implementations must bound every network call with their configured
/// timeout, and must fail with [`UpstreamError::MissingCredentials`] before
/// touching the network when a required credential is absent.
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Resolve an identifier through the store's metadata endpoint.
    async fn lookup(&self, media_id: &MediaReference) -> Result<LookupResult, UpstreamError>;

    /// Confirm size and content type of a resolved object.
    async fn probe(&self, locator: &UpstreamLocator) -> Result<ObjectInfo, UpstreamError>;

    /// Open a byte stream for the object, optionally limited to `range`.
    async fn open(
        &self,
        locator: &UpstreamLocator,
        range: Option<ByteRange>,
    ) -> Result<UpstreamBody, UpstreamError>;

    /// Short human-readable description for logs (no credentials).
    fn describe(&self) -> String;
}

/// Replace every occurrence of `secret` in `text` with a placeholder.
pub fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "<redacted>"),
        _ => text.to_string(),
    }
}
