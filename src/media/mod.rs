//! Media request pipeline.
//!
//! This module turns an identifier and an optional `Range` header into a
//! streamed response:
//!
//! - [`resolver`] - identifier to upstream locator (lookup + probe)
//! - [`classify`] - definitive content type and range support
//! - [`range`] - Range header parsing and relay planning
//! - [`relay`] - cancellable streaming from upstream to client
//! - [`service`] - orchestration of the above for GET and HEAD

pub mod classify;
pub mod range;
pub mod relay;
pub mod resolver;
pub mod service;
mod types;

pub use classify::{classify, Classification, MediaFormat, GENERIC_BINARY_MIME};
pub use range::{plan, RangeRequest, RelayPlan};
pub use relay::{
    RelayBody, RelayOutcome, RelayResponse, StreamingRelay, DEFAULT_CACHE_MAX_AGE,
    DEFAULT_RELAY_BUFFER_CHUNKS,
};
pub use resolver::{IdentifierResolver, ResolvedMedia};
pub use service::{MediaDescription, MediaService};
pub use types::{ByteRange, ContentDescriptor, MediaReference, UpstreamLocator};
