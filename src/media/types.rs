use std::fmt;

use crate::error::GatewayError;

// =============================================================================
// Media Reference
// =============================================================================

/// Opaque identifier of a media object in the upstream store.
///
/// No structure is assumed beyond being non-empty. Stores percent-encode it
/// before placing it in any upstream URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaReference(String);

impl MediaReference {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, GatewayError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(GatewayError::InvalidIdentifier {
                reason: "media identifier must not be empty".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form, safe for use in a query string or path segment.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Upstream Locator
// =============================================================================

/// Resolved location of a media object inside the upstream store.
///
/// Only valid for the request that resolved it; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamLocator(String);

impl UpstreamLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased extension of the last path segment, if it has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.0.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for UpstreamLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Content Descriptor
// =============================================================================

/// What the gateway knows about an object before relaying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Definitive MIME type sent as `Content-Type`
    pub mime_type: String,

    /// Total object size in bytes, when the upstream reported one
    pub total_size: Option<u64>,

    /// Whether Range requests are honored for this object
    pub supports_range: bool,
}

/// Inclusive byte range forwarded to the upstream store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered (both ends inclusive).
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for an outbound `Range` header.
    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}
