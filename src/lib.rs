//! # Media Gateway
//!
//! A streaming gateway that serves media files referenced by opaque
//! identifiers. Each request is resolved against an upstream store, given a
//! definitive content type and relayed to the client without buffering the
//! whole file. Video supports HTTP Range requests so players can seek.
//!
//! ## Features
//!
//! - **Identifier resolution**: metadata lookup plus an optional probe
//! - **Content classification**: static extension table with upstream fallback
//! - **Range support**: single `bytes=` ranges for video, clamped and validated
//! - **Cancellable relay**: client disconnect closes the upstream stream
//! - **Pluggable upstreams**: Bot API file protocol over HTTP, or S3
//!
//! ## Architecture
//!
//! - [`upstream`] - The `MediaStore` trait and its HTTP and S3 backends
//! - [`media`] - Resolver, classifier, range planner, relay and service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error taxonomy shared by all layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use media_gateway::{create_router, HttpMediaStore, MediaService, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let timeout = Duration::from_secs(15);
//!     let store = HttpMediaStore::new(
//!         "https://api.telegram.org",
//!         std::env::var("MEDIA_UPSTREAM_TOKEN").ok(),
//!         timeout,
//!     );
//!     let router = create_router(MediaService::new(store, timeout), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3002").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod upstream;

// Re-export commonly used types
pub use config::{Backend, CheckConfig, Cli, Command, ServeConfig, UpstreamConfig};
pub use error::{GatewayError, RangeError, UpstreamError};
pub use media::{
    classify, ByteRange, ContentDescriptor, MediaDescription, MediaFormat, MediaReference,
    MediaService, RelayOutcome, RelayPlan, RelayResponse, UpstreamLocator,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use upstream::{
    create_s3_client, HttpMediaStore, LookupResult, MediaStore, ObjectInfo, S3MediaStore,
    UpstreamBody, DEFAULT_UPSTREAM_URL,
};
