//! pack-server binary entry point.
//!
//! Usage:
//! ```bash
//! pack-server --config pack-server.toml
//! pack-server --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use packhost_server::cleanup::spawn_cleanup_task;
use packhost_server::config::Config;
use packhost_server::http::{build_router, health};
use packhost_server::server::PackServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// HTTP registry for content-addressed resource packs.
#[derive(Parser, Debug)]
#[command(name = "pack-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "pack-server.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        tracing::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
        let config = Config::default();
        config.validate()?;
        config
    };

    let bind_address = config.http.bind_address.clone();
    let cleanup = config.cleanup.clone();
    let (server, blobs) = PackServer::open(config)
        .await
        .context("starting pack server")?;
    let server = Arc::new(server);

    if server.identity().is_proxied() {
        tracing::info!(
            "Trusting client IP from {} header",
            server.config().proxy.ip_header
        );
    }

    let cleanup_handle = spawn_cleanup_task(blobs, cleanup);
    health::init_start_time();

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    tracing::info!(
        "pack-server v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?
    );

    let app = build_router(server);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cleanup_handle.abort();
    tracing::info!("pack-server stopped");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "packhost_server=info,pack_server=info,packhost_content=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
