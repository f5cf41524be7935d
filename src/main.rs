//! Media Gateway - relays media files from an upstream store to HTTP clients.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_gateway::{
    config::{Backend, CheckConfig, Cli, Command, ServeConfig, UpstreamConfig},
    create_router, create_s3_client, HttpMediaStore, MediaService, MediaStore, RouterConfig,
    S3MediaStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Upstream Construction
// =============================================================================

fn build_http_store(config: &UpstreamConfig) -> HttpMediaStore {
    HttpMediaStore::new(
        config.upstream_url.clone(),
        config.token().map(str::to_string),
        config.timeout(),
    )
}

async fn build_s3_store(config: &UpstreamConfig) -> S3MediaStore {
    let (client, has_credentials) =
        create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;

    S3MediaStore::new(
        client,
        config.bucket().unwrap_or_default().to_string(),
        config.s3_prefix.clone(),
        config.timeout(),
        has_credentials,
    )
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Media Gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");

    match config.upstream.backend {
        Backend::Http => {
            let store = build_http_store(&config.upstream);
            info!("  Upstream: {}", store.describe());
            if !store.has_credentials() {
                error!("  Upstream token is not configured (--upstream-token or MEDIA_UPSTREAM_TOKEN)");
                error!("  Media requests will fail with 500 until it is set");
            }
            serve(store, &config).await
        }
        Backend::S3 => {
            let store = build_s3_store(&config.upstream).await;
            info!("  Upstream: {}", store.describe());
            if let Some(ref endpoint) = config.upstream.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.upstream.s3_region);
            if !store.has_credentials() {
                error!("  AWS credentials could not be resolved from the environment");
                error!("  Media requests will fail with 500 until they are available");
            }
            serve(store, &config).await
        }
    }
}

async fn serve<S: MediaStore>(store: S, config: &ServeConfig) -> ExitCode {
    info!("  Upstream timeout: {}s", config.upstream.upstream_timeout);
    info!(
        "  Relay buffer: {} chunks, cache max-age: {}s",
        config.relay_buffer_chunks, config.cache_max_age
    );
    match &config.cors_origins {
        Some(origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => warn!("  CORS: any origin allowed"),
    }

    let media_service = MediaService::with_buffer_chunks(
        store,
        config.upstream.timeout(),
        config.relay_buffer_chunks,
    );
    let router = create_router(media_service, build_router_config(config));

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl -r 0-1023 http://{}/media/<file_id>", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "media_gateway=debug,tower_http=debug"
    } else {
        "media_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Media Gateway Check");
    println!("═══════════════════");
    println!();

    if let Err(e) = config.upstream.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    match config.upstream.backend {
        Backend::Http => {
            let store = build_http_store(&config.upstream);
            if store.has_credentials() {
                println!("✓ Token: configured");
            } else {
                println!("✗ Token: not configured");
                return ExitCode::FAILURE;
            }
            check(store, &config).await
        }
        Backend::S3 => {
            let store = build_s3_store(&config.upstream).await;
            if store.has_credentials() {
                println!("✓ AWS credentials: resolved");
            } else {
                println!("✗ AWS credentials: not found");
                return ExitCode::FAILURE;
            }
            check(store, &config).await
        }
    }
}

async fn check<S: MediaStore>(store: S, config: &CheckConfig) -> ExitCode {
    println!("✓ Upstream: {}", store.describe());
    println!();
    print!("Resolving {}... ", config.media_id);

    let service = MediaService::new(store, config.upstream.timeout());
    match service.describe(&config.media_id).await {
        Ok(description) => {
            let descriptor = &description.descriptor;
            println!("✓ success");
            println!();
            println!("  Locator:        {}", description.locator);
            println!("  Content-Type:   {}", descriptor.mime_type);
            match descriptor.total_size {
                Some(size) => println!("  Size:           {} bytes", size),
                None => println!("  Size:           unknown"),
            }
            println!(
                "  Range requests: {}",
                if descriptor.supports_range {
                    "supported"
                } else {
                    "ignored (served in full)"
                }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
