use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::upstream::MediaStore;

use super::types::{MediaReference, UpstreamLocator};

/// What the resolver learned about one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub locator: UpstreamLocator,
    pub total_size: Option<u64>,
    pub reported_type: Option<String>,
}

/// Turns media identifiers into upstream locators.
///
/// Resolution is a lookup against the store's metadata endpoint, followed by
/// a probe of the resolved object when the lookup did not report both size
/// and content type. Lookup values win when both are present.
pub struct IdentifierResolver<S: MediaStore> {
    store: Arc<S>,
}

impl<S: MediaStore> IdentifierResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, media_id: &MediaReference) -> Result<ResolvedMedia, GatewayError> {
        let lookup = self
            .store
            .lookup(media_id)
            .await
            .map_err(|e| GatewayError::from_upstream(media_id.as_str(), e))?;

        let mut resolved = ResolvedMedia {
            locator: lookup.locator,
            total_size: lookup.size,
            reported_type: lookup.content_type,
        };

        if resolved.total_size.is_some() && resolved.reported_type.is_some() {
            return Ok(resolved);
        }

        match self.store.probe(&resolved.locator).await {
            Ok(info) => {
                resolved.total_size = resolved.total_size.or(info.size);
                resolved.reported_type = resolved.reported_type.or(info.content_type);
            }
            // The lookup already gave us a size; a missing content type is
            // recoverable through the extension table.
            Err(e) if resolved.total_size.is_some() => {
                warn!(
                    media_id = %media_id,
                    locator = %resolved.locator,
                    "Probe failed, continuing with lookup metadata: {}",
                    e
                );
            }
            Err(e) => return Err(GatewayError::from_upstream(media_id.as_str(), e)),
        }

        debug!(
            media_id = %media_id,
            locator = %resolved.locator,
            size = ?resolved.total_size,
            content_type = ?resolved.reported_type,
            "Resolved media"
        );

        Ok(resolved)
    }
}
