use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::UnixListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use l2bridge::{AppState, Driver, MemoryEngine, create_router};

#[derive(Parser)]
#[command(name = "l2bridge")]
#[command(about = "l2bridge - local-scope network driver plugin")]
struct Args {
    /// Unix socket the plugin API listens on
    #[arg(long, default_value = "/run/docker/plugins/l2bridge.sock")]
    socket: PathBuf,

    /// Additional log filter directive (e.g. "l2bridge=debug")
    #[arg(long)]
    log_filter: Option<String>,
}

/// Remove a leftover socket file from a previous run.
async fn remove_stale_socket(path: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            warn!(path = %path.display(), "Removed stale plugin socket");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut filter = EnvFilter::from_default_env().add_directive("l2bridge=info".parse()?);
    if let Some(directive) = &args.log_filter {
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("invalid log filter {:?}", directive))?,
        );
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(socket = %args.socket.display(), "Starting l2bridge network driver");

    if let Some(parent) = args.socket.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    remove_stale_socket(&args.socket).await?;

    let listener = UnixListener::bind(&args.socket)
        .with_context(|| format!("binding {}", args.socket.display()))?;

    let driver = Driver::new(Arc::new(MemoryEngine::new()));
    let router = create_router(Arc::new(AppState { driver }));

    // Set up signal handlers
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

    info!(socket = %args.socket.display(), "Plugin API listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        })
        .await;

    if let Err(e) = tokio::fs::remove_file(&args.socket).await {
        warn!(error = %e, path = %args.socket.display(), "Failed to remove plugin socket");
    }

    served.context("plugin API server")?;
    info!("Server stopped");
    Ok(())
}
