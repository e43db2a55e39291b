//! HTTP server setup and routing

use crate::context::PlayerContext;
use crate::error::{Error, Result};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub player: PlayerContext,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    pub fn new(player: PlayerContext, port: u16) -> Self {
        Self {
            player,
            port,
            started_at: Utc::now(),
        }
    }
}

/// Build the router with every endpoint attached
pub fn create_router(ctx: AppContext) -> Router {
    use super::handlers;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::build_info))

        // Playback control
        .route("/playback/state", get(handlers::get_playback_state))
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/toggle", post(handlers::toggle))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/skip-forward", post(handlers::skip_forward))
        .route("/playback/skip-backward", post(handlers::skip_backward))
        .route("/playback/rate", post(handlers::set_playback_rate))

        // Audio
        .route("/audio/volume", post(handlers::set_volume))
        .route("/audio/mute/toggle", post(handlers::toggle_mute))

        // Collection and item selection
        .route("/collection", get(handlers::get_collection).post(handlers::load_collection).put(handlers::put_collection))
        .route("/items/:item_id/select", post(handlers::select_item))

        // Read-along overlay
        .route("/readalong", get(handlers::get_read_along))
        .route("/readalong/segments/:index/active", get(handlers::is_segment_active))
        .route("/readalong/segments/:index/seek", post(handlers::seek_to_segment))
        .route("/readalong/auto-scroll", post(handlers::set_auto_scroll))
        .route("/readalong/text-size", post(handlers::set_text_size))
        .route("/readalong/viewport", post(handlers::update_viewport))
        .route("/readalong/layout", post(handlers::update_layout))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Views are served from other origins
        .layer(CorsLayer::permissive())
}

/// Bind the configured port and serve until `shutdown` resolves
pub async fn run(ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
