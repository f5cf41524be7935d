//! Media Service for orchestrating one gateway request.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          MediaService                            │
//! │                                                                  │
//! │  stream() / head()                                               │
//! │   1. Parse identifier     3. Classify content                    │
//! │   2. Resolve locator      4. Plan range       5. Relay (GET)     │
//! │           │                                          │           │
//! │           ▼                                          ▼           │
//! │  ┌────────────────────┐                 ┌──────────────────────┐ │
//! │  │ IdentifierResolver │                 │   StreamingRelay     │ │
//! │  └────────────────────┘                 └──────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution and classification happen before any byte fetch, so an unknown
//! identifier or unsatisfiable range never opens an upstream stream.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{GatewayError, RangeError};
use crate::upstream::MediaStore;

use super::classify::classify;
use super::range::{plan, RelayPlan};
use super::relay::{RelayResponse, StreamingRelay, DEFAULT_RELAY_BUFFER_CHUNKS};
use super::resolver::IdentifierResolver;
use super::types::{ContentDescriptor, MediaReference, UpstreamLocator};

/// Everything known about a media item before its bytes are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media_id: MediaReference,
    pub locator: UpstreamLocator,
    pub descriptor: ContentDescriptor,
}

/// Entry point for media requests.
pub struct MediaService<S: MediaStore> {
    resolver: IdentifierResolver<S>,
    relay: StreamingRelay<S>,
}

impl<S: MediaStore> MediaService<S> {
    /// Create a service with the default relay buffer.
    pub fn new(store: S, timeout: Duration) -> Self {
        Self::with_buffer_chunks(store, timeout, DEFAULT_RELAY_BUFFER_CHUNKS)
    }

    /// Create a service with a custom relay buffer size (in chunks).
    pub fn with_buffer_chunks(store: S, timeout: Duration, buffer_chunks: usize) -> Self {
        let store = Arc::new(store);
        Self {
            resolver: IdentifierResolver::new(Arc::clone(&store)),
            relay: StreamingRelay::new(store, timeout, buffer_chunks),
        }
    }

    /// Number of relays currently streaming.
    pub fn active_relays(&self) -> usize {
        self.relay.active_relays()
    }

    /// Resolve and classify an identifier without fetching any bytes.
    pub async fn describe(&self, raw_id: &str) -> Result<MediaDescription, GatewayError> {
        let media_id = MediaReference::parse(raw_id)?;
        let resolved = self.resolver.resolve(&media_id).await?;

        let classification = classify(resolved.reported_type.as_deref(), &resolved.locator);
        let descriptor = ContentDescriptor {
            mime_type: classification.mime_type,
            total_size: resolved.total_size,
            supports_range: classification.supports_range,
        };

        Ok(MediaDescription {
            media_id,
            locator: resolved.locator,
            descriptor,
        })
    }

    /// Handle a `GET`: plan the request and start relaying bytes.
    pub async fn stream(
        &self,
        raw_id: &str,
        range_header: Option<&str>,
    ) -> Result<RelayResponse, GatewayError> {
        let description = self.describe(raw_id).await?;
        let plan = Self::plan_request(&description, range_header)?;

        self.relay
            .execute(
                &description.media_id,
                &description.locator,
                description.descriptor,
                plan,
            )
            .await
    }

    /// Handle a `HEAD`: same resolution and planning, no byte fetch.
    pub async fn head(
        &self,
        raw_id: &str,
        range_header: Option<&str>,
    ) -> Result<RelayResponse, GatewayError> {
        let description = self.describe(raw_id).await?;
        let plan = Self::plan_request(&description, range_header)?;

        if plan == RelayPlan::Unsatisfiable {
            return Err(GatewayError::Range {
                media_id: description.media_id.to_string(),
                source: RangeError::Unsatisfiable {
                    total_size: description.descriptor.total_size.unwrap_or(0),
                },
            });
        }

        Ok(RelayResponse::headers_only(description.descriptor, plan))
    }

    fn plan_request(
        description: &MediaDescription,
        range_header: Option<&str>,
    ) -> Result<RelayPlan, GatewayError> {
        let plan = plan(&description.descriptor, range_header).map_err(|source| {
            GatewayError::Range {
                media_id: description.media_id.to_string(),
                source,
            }
        })?;

        debug!(
            media_id = %description.media_id,
            mime_type = %description.descriptor.mime_type,
            size = ?description.descriptor.total_size,
            plan = ?plan,
            "Planned relay"
        );

        Ok(plan)
    }
}
