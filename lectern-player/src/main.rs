//! Lectern Player - Main entry point
//!
//! Composition root: loads the configuration, builds the one player
//! context of this session and serves the HTTP/SSE control surface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lectern_player::api::{self, AppContext};
use lectern_player::backend::ClockBackend;
use lectern_player::services::{ContentClient, Services};
use lectern_player::{PlayerConfig, PlayerContext};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for lectern-player
#[derive(Parser, Debug)]
#[command(name = "lectern-player")]
#[command(about = "Audio player with read-along overlay")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "LECTERN_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the content service (overrides the config file)
    #[arg(long, env = "LECTERN_API_URL")]
    api_base_url: Option<String>,

    /// Collection to load at startup
    #[arg(long)]
    collection: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing comes up before the config so its resolution is logged.
    // RUST_LOG wins over the configured level.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(env_filter.unwrap_or_else(|| default_filter("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(base_url) = args.api_base_url {
        config.api.base_url = base_url;
    }
    if !level_from_env {
        if let Err(e) = filter_handle.reload(default_filter(&config.logging.level)) {
            warn!("Could not apply log level {}: {}", config.logging.level, e);
        }
    }

    info!(
        "Starting Lectern Player v{} ({}) on port {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.port
    );
    info!("Content service: {}", config.api.base_url);

    let client = Arc::new(ContentClient::new(&config.api).context("Failed to create content client")?);
    let (backend, resource_rx) = ClockBackend::with_http(config.playback.autoplay_policy, client.http_client());
    let _clock = backend.spawn_clock(config.playback.tick_interval());

    let port = config.port;
    let player = PlayerContext::new(config, backend, resource_rx, Services::from_client(client));
    let _tasks = player.start().await;

    if let Some(collection_id) = args.collection {
        match player.load_collection(&collection_id).await {
            Ok(count) => info!("Loaded collection {} ({} items)", collection_id, count),
            Err(e) => warn!("Could not load collection {}: {}", collection_id, e),
        }
    }

    api::run(AppContext::new(player, port), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Filter for our crates and the HTTP trace layer at `level`
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "lectern_player={0},lectern_common={0},tower_http={0}",
        level
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_every_crate() {
        let filter = default_filter("debug").to_string();
        assert!(filter.contains("lectern_player=debug"));
        assert!(filter.contains("lectern_common=debug"));
        assert!(filter.contains("tower_http=debug"));
    }

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from(["lectern-player", "--port", "6001", "--collection", "book"]);
        assert_eq!(args.port, Some(6001));
        assert_eq!(args.collection.as_deref(), Some("book"));
        assert!(args.config.is_none());
    }
}
