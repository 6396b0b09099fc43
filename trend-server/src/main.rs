//! trend-server - CSV time-series merge service
//!
//! Startup order: tracing, build banner, configuration (CLI > ENV > TOML >
//! defaults), exports directory, HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use trend_common::config::{load_toml_config, ServerOverrides, ServiceConfig};
use trend_server::{build_router, AppState};

/// Command-line arguments for trend-server
#[derive(Parser, Debug)]
#[command(name = "trend-server")]
#[command(about = "Merge CSV time series onto one timeline and chart them")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory for locally hosted exports
    #[arg(long, env = "TREND_EXPORTS_DIR")]
    exports_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "TREND_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "TREND_MAX_UPLOAD_MB")]
    max_upload_mb: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    trend_server::logging::init();

    info!(
        "Starting trend-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::from_env(
        ServerOverrides {
            host: args.host,
            port: args.port,
            exports_dir: args.exports_dir,
            max_upload_mb: args.max_upload_mb,
        },
        &toml_config,
    );

    info!("Exports directory: {}", config.exports_dir.display());
    info!(
        "Max upload: {} MB",
        config.max_upload_bytes / (1024 * 1024)
    );
    match &config.github {
        Some(gh) => info!("GitHub publishing enabled: {} ({})", gh.repo, gh.branch),
        None => info!("GitHub publishing disabled"),
    }
    match &config.drive {
        Some(drive) => info!("Drive publishing enabled: folder {}", drive.folder_id),
        None => info!("Drive publishing disabled"),
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("trend-server/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let state = AppState::new(config, http);
    state
        .exports
        .ensure_dir()
        .with_context(|| format!("Failed to create {}", state.exports.root().display()))?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("trend-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
