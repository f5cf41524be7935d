//! Configuration management for the media gateway.
//!
//! This module provides the CLI and configuration types:
//! - Command-line arguments via clap
//! - Environment variables with `MEDIA_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use media_gateway::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Check(config) => println!("Checking {}", config.media_id),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `MEDIA_HOST` - Server bind address (default: 0.0.0.0)
//! - `MEDIA_PORT` - Server port (default: 3002)
//! - `MEDIA_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `MEDIA_RELAY_BUFFER_CHUNKS` - Chunks buffered per relay (default: 8)
//! - `MEDIA_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `MEDIA_UPSTREAM` - Upstream backend, `http` or `s3` (default: http)
//! - `MEDIA_UPSTREAM_URL` - File API base URL (default: https://api.telegram.org)
//! - `MEDIA_UPSTREAM_TOKEN` - File API bot token
//! - `MEDIA_UPSTREAM_TIMEOUT` - Per-call upstream timeout in seconds (default: 15)
//! - `MEDIA_S3_BUCKET`, `MEDIA_S3_PREFIX`, `MEDIA_S3_ENDPOINT`, `MEDIA_S3_REGION`

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::media::{DEFAULT_CACHE_MAX_AGE, DEFAULT_RELAY_BUFFER_CHUNKS};
use crate::upstream::DEFAULT_UPSTREAM_URL;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3002;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default per-call upstream timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Media Gateway - relays media files from an upstream store to HTTP clients.
///
/// Resolves opaque media identifiers, serves the right content type and
/// streams bytes (with Range support for video) without buffering whole files.
#[derive(Parser, Debug, Clone)]
#[command(name = "media-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server.
    Serve(ServeConfig),

    /// Resolve one media identifier against the upstream and print what the
    /// gateway would serve.
    Check(CheckConfig),
}

/// Upstream store backend.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Bot API file protocol over HTTP
    #[default]
    Http,

    /// S3 or S3-compatible object storage
    S3,
}

// =============================================================================
// Upstream Configuration
// =============================================================================

/// Upstream settings shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct UpstreamConfig {
    /// Upstream backend to relay from.
    #[arg(
        long = "upstream",
        value_enum,
        default_value_t = Backend::Http,
        env = "MEDIA_UPSTREAM"
    )]
    pub backend: Backend,

    /// Base URL of the upstream file API.
    #[arg(long, default_value = DEFAULT_UPSTREAM_URL, env = "MEDIA_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Bot token for the upstream file API.
    ///
    /// The server starts without it, but every media request then fails
    /// with a configuration error.
    #[arg(long, env = "MEDIA_UPSTREAM_TOKEN", hide_env_values = true)]
    pub upstream_token: Option<String>,

    /// S3 bucket holding the media objects (required with `--upstream s3`).
    #[arg(long, env = "MEDIA_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix prepended to media identifiers.
    #[arg(long, env = "MEDIA_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "MEDIA_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "MEDIA_S3_REGION")]
    pub s3_region: String,

    /// Timeout in seconds for each upstream call.
    #[arg(
        long,
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS,
        env = "MEDIA_UPSTREAM_TIMEOUT"
    )]
    pub upstream_timeout: u64,
}

impl UpstreamConfig {
    /// Validate the upstream settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.upstream_timeout == 0 {
            return Err("upstream_timeout must be greater than 0".to_string());
        }

        match self.backend {
            Backend::Http => {
                let url = url::Url::parse(&self.upstream_url)
                    .map_err(|e| format!("Invalid upstream URL '{}': {}", self.upstream_url, e))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(format!(
                        "Upstream URL must use http or https, got '{}'",
                        url.scheme()
                    ));
                }
            }
            Backend::S3 => {
                if self.bucket().is_none() {
                    return Err(
                        "S3 bucket name is required with --upstream s3. \
                         Set --s3-bucket or MEDIA_S3_BUCKET"
                            .to_string(),
                    );
                }
            }
        }

        Ok(())
    }

    /// Per-call upstream timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    /// The bot token, if one is configured and non-blank.
    pub fn token(&self) -> Option<&str> {
        self.upstream_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// The S3 bucket, if one is configured and non-blank.
    pub fn bucket(&self) -> Option<&str> {
        self.s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

// =============================================================================
// Serve Configuration
// =============================================================================

/// Settings for `media-gateway serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MEDIA_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MEDIA_PORT")]
    pub port: u16,

    // =========================================================================
    // Relay Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "MEDIA_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Number of chunks buffered between upstream and each client.
    #[arg(
        long,
        default_value_t = DEFAULT_RELAY_BUFFER_CHUNKS,
        env = "MEDIA_RELAY_BUFFER_CHUNKS"
    )]
    pub relay_buffer_chunks: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MEDIA_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    #[command(flatten)]
    pub upstream: UpstreamConfig,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.relay_buffer_chunks == 0 {
            return Err("relay_buffer_chunks must be greater than 0".to_string());
        }

        self.upstream.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Check Configuration
// =============================================================================

/// Settings for `media-gateway check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Media identifier to resolve.
    pub media_id: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(flatten)]
    pub upstream: UpstreamConfig,
}

// =============================================================================
// Tests
// =============================================================================
