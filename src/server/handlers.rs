//! HTTP request handlers for the media gateway.
//!
//! # Endpoints
//!
//! - `GET /media/{file_id}` - Stream a media object (optional `Range`)
//! - `HEAD /media/{file_id}` - Same headers as `GET`, no body
//! - `GET /health` - Health check endpoint

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{GatewayError, RangeError};
use crate::media::{MediaService, RelayResponse, DEFAULT_CACHE_MAX_AGE};
use crate::upstream::MediaStore;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the media service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: MediaStore> {
    /// The media service for processing requests
    pub media_service: Arc<MediaService<S>>,

    /// Cache-Control max-age in seconds for relayed media
    pub cache_max_age: u32,
}

impl<S: MediaStore> AppState<S> {
    /// Create a new application state with the given media service.
    pub fn new(media_service: MediaService<S>) -> Self {
        Self::with_cache_max_age(media_service, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(media_service: MediaService<S>, cache_max_age: u32) -> Self {
        Self {
            media_service: Arc::new(media_service),
            cache_max_age,
        }
    }
}

impl<S: MediaStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            media_service: Arc::clone(&self.media_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions with a body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_range")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Relay sessions currently streaming
    pub active_relays: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GatewayError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404 is logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level
///
/// An unsatisfiable range yields 416 with an empty body and
/// `Content-Range: bytes */{total}`; every other error carries an
/// [`ErrorResponse`] body.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GatewayError::InvalidIdentifier { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_identifier")
            }
            GatewayError::Range {
                source: RangeError::Malformed { .. },
                ..
            } => (StatusCode::BAD_REQUEST, "invalid_range"),
            GatewayError::Range {
                source: RangeError::Unsatisfiable { .. },
                ..
            } => (StatusCode::RANGE_NOT_SATISFIABLE, "range_not_satisfiable"),
            GatewayError::Resolution { .. } => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            GatewayError::Transport { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
        };

        let message = self.to_string();
        let media_id = self.media_id().unwrap_or("-");
        let endpoint = match &self {
            GatewayError::Transport { source, .. } => source.endpoint().unwrap_or("-"),
            _ => "-",
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                media_id = media_id,
                endpoint = endpoint,
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                media_id = media_id,
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                media_id = media_id,
                "Client error: {}",
                message
            );
        }

        if let GatewayError::Range {
            source: RangeError::Unsatisfiable { total_size },
            ..
        } = &self
        {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::try_from(format!("bytes */{}", total_size)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            return (status, headers).into_response();
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Extract the `Range` header.
///
/// Bytes that are not valid UTF-8 are replaced, so such a header fails range
/// parsing like any other malformed value.
fn range_header(headers: &HeaderMap) -> Option<Cow<'_, str>> {
    headers
        .get(header::RANGE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle media requests.
///
/// # Endpoint
///
/// `GET /media/{file_id}`
///
/// # Response
///
/// - `200 OK`: full object; video also advertises `Accept-Ranges` and
///   `Content-Length`
/// - `206 Partial Content`: requested byte range of a video
/// - `400 Bad Request`: empty identifier or malformed `Range`
/// - `404 Not Found`: upstream does not know the identifier
/// - `416 Range Not Satisfiable`: range starts past the end (empty body)
/// - `500 Internal Server Error`: missing credential, upstream timeout or
///   transport failure before the first byte
pub async fn media_handler<S: MediaStore>(
    State(state): State<AppState<S>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<RelayResponse, GatewayError> {
    let range = range_header(&headers);
    let response = state
        .media_service
        .stream(&file_id, range.as_deref())
        .await?;

    Ok(response.with_cache_max_age(state.cache_max_age))
}

/// Handle `HEAD /media/{file_id}`.
///
/// Runs resolution and planning like `GET` and returns the same status and
/// headers without fetching any bytes.
pub async fn media_head_handler<S: MediaStore>(
    State(state): State<AppState<S>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<RelayResponse, GatewayError> {
    let range = range_header(&headers);
    let response = state.media_service.head(&file_id, range.as_deref()).await?;

    Ok(response.with_cache_max_age(state.cache_max_age))
}

/// `GET /media/` with no identifier.
pub async fn missing_identifier_handler() -> GatewayError {
    GatewayError::InvalidIdentifier {
        reason: "identifier must not be empty".to_string(),
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "active_relays": 0
/// }
/// ```
pub async fn health_handler<S: MediaStore>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_relays: state.media_service.active_relays(),
    })
}
