use std::time::Duration;

use thiserror::Error;

/// Errors reported by an upstream media store.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// A credential the store needs is absent from process configuration
    #[error("Missing upstream credential: {0}")]
    MissingCredentials(&'static str),

    /// The store does not know the object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The store answered but did not provide a usable content path
    #[error("No content locator returned for {0}")]
    NoLocator(String),

    /// The call did not complete within the configured timeout
    #[error("Timed out after {}s calling {endpoint}", timeout.as_secs())]
    Timeout { endpoint: String, timeout: Duration },

    /// Network or connection error
    #[error("Connection error calling {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    /// The store answered with a status the gateway cannot use
    #[error("Upstream {endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },

    /// The byte stream failed after it was opened
    #[error("Upstream stream error: {0}")]
    Stream(String),
}

impl UpstreamError {
    /// The (redacted) upstream endpoint involved in this failure, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            UpstreamError::Timeout { endpoint, .. }
            | UpstreamError::Connection { endpoint, .. }
            | UpstreamError::Status { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

/// Errors produced while interpreting a client `Range` header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Header is not a well-formed single `bytes=` range
    #[error("Malformed Range header: {header}")]
    Malformed { header: String },

    /// Requested start lies at or beyond the end of the object
    #[error("Range not satisfiable for object of {total_size} bytes")]
    Unsatisfiable { total_size: u64 },
}

/// Request-level failures of the media gateway.
///
/// Every variant maps to exactly one terminal HTTP response (see
/// `server::handlers`). Failures that happen after the response has started
/// streaming never become a `GatewayError`; the relay ends the body instead.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The identifier cannot be used at all (e.g. empty)
    #[error("Invalid media identifier: {reason}")]
    InvalidIdentifier { reason: String },

    /// Required upstream configuration is missing (not retried)
    #[error("Configuration error for {media_id}: {reason}")]
    Configuration { media_id: String, reason: String },

    /// The upstream store does not know the identifier
    #[error("Media not found: {media_id} ({reason})")]
    Resolution { media_id: String, reason: String },

    /// The client's Range header cannot be honored
    #[error("Range error for {media_id}: {source}")]
    Range {
        media_id: String,
        #[source]
        source: RangeError,
    },

    /// Timeout or connection failure before any byte reached the client
    #[error("Upstream transport error for {media_id}: {source}")]
    Transport {
        media_id: String,
        #[source]
        source: UpstreamError,
    },
}

impl GatewayError {
    /// Classify an upstream failure for the given media identifier.
    pub fn from_upstream(media_id: &str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredentials(name) => GatewayError::Configuration {
                media_id: media_id.to_string(),
                reason: format!("upstream credential {} is not configured", name),
            },
            UpstreamError::NotFound(reason) | UpstreamError::NoLocator(reason) => {
                GatewayError::Resolution {
                    media_id: media_id.to_string(),
                    reason,
                }
            }
            other => GatewayError::Transport {
                media_id: media_id.to_string(),
                source: other,
            },
        }
    }

    /// The media identifier this error concerns, when known.
    pub fn media_id(&self) -> Option<&str> {
        match self {
            GatewayError::Configuration { media_id, .. }
            | GatewayError::Resolution { media_id, .. }
            | GatewayError::Range { media_id, .. }
            | GatewayError::Transport { media_id, .. } => Some(media_id),
            GatewayError::InvalidIdentifier { .. } => None,
        }
    }
}
