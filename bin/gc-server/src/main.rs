//! GroupCheck Server
//!
//! Answers "is this user a member of the configured directory group?" over HTTP:
//! - `POST /api/checkAuthorization`
//! - `GET /api/health`
//! - OpenAPI document and Swagger UI
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GC_CONFIG` | - | Path to a TOML config file |
//! | `GC_HOST` | `0.0.0.0` | Bind address |
//! | `GC_PORT` / `PORT` | `5000` | HTTP port |
//! | `GC_ALLOWED_ORIGINS` | any | Comma-separated CORS origins |
//! | `GC_TENANT_ID` | - | Directory tenant (required) |
//! | `GC_CLIENT_ID` | - | Service application id (required) |
//! | `GC_CLIENT_SECRET` | - | Service application secret (required) |
//! | `GC_GROUP_ID` | - | Group to check membership of (required) |
//! | `GC_IDENTIFIER_KIND` | `email` | `email` or `user_id` |
//! | `GC_TOKEN_CACHE` | `true` | Reuse access tokens until close to expiry |
//! | `GC_DIAGNOSTICS` | `false` | Include failure detail in 500 responses |
//! | `GC_LOG_FORMAT` | `pretty` | `json` for structured logs |
//! | `RUST_LOG` | `info` | Log level |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;

use gc_api::{create_router, ApiOptions};
use gc_common::logging::{self, LogFormat};
use gc_config::AppConfig;
use gc_directory::{
    AuthorizationService, CachingTokenProvider, ClientCredentialsProvider, GraphClient,
    GraphClientConfig, TokenSource,
};

#[derive(Parser, Debug)]
#[command(name = "gc-server")]
#[command(about = "GroupCheck - directory group membership authorization service")]
struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "GC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(LogFormat::from_env());

    info!("Starting GroupCheck server");

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let directory = &config.directory;

    let client_config = GraphClientConfig {
        base_url: directory.graph_base_url.clone(),
        connect_timeout: directory.connect_timeout(),
        request_timeout: directory.request_timeout(),
        max_pages: directory.max_pages,
    };
    let http = client_config
        .build_http_client()
        .context("Failed to build HTTP client")?;

    let provider = Arc::new(ClientCredentialsProvider::new(
        http.clone(),
        &directory.authority_url,
        directory.credentials(),
    ));
    let tokens: Arc<dyn TokenSource> = if directory.token_cache {
        Arc::new(CachingTokenProvider::new(provider))
    } else {
        provider
    };

    let service = Arc::new(AuthorizationService::new(
        tokens,
        Arc::new(GraphClient::with_http_client(client_config, http)),
        directory.group()?,
        config.identifier_kind,
    ));

    let app = create_router(
        service,
        ApiOptions {
            diagnostics: config.diagnostics,
            allowed_origins: config.server.allowed_origins.clone(),
        },
    )
    .layer(TraceLayer::new_for_http());

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "GroupCheck server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("GroupCheck server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
