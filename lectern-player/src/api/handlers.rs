//! HTTP request handlers
//!
//! Engine control methods never fail; their outcome (`accepted`) and the
//! resulting snapshot are returned as-is. Only lookups and the external
//! services produce error statuses.

use crate::api::server::AppContext;
use crate::context::SelectOptions;
use crate::error::Error;
use crate::readalong::{ReadAlongView, ScrollRequest, SegmentBounds, Viewport};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lectern_common::events::{PlaybackSnapshot, TextSize};
use lectern_common::Item;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Json<Self> {
        Json(Self { status: status.into() })
    }
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    session_id: String,
    port: u16,
    uptime_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

/// Outcome of a control call plus the state it left behind
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub accepted: bool,
    pub state: PlaybackSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkipRequest {
    seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCollectionRequest {
    collection_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PutCollectionRequest {
    items: Vec<Item>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    item_count: usize,
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(default)]
    autoplay: bool,
    resume_at: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentActiveResponse {
    segment_index: usize,
    active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AutoScrollRequest {
    enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScrollResponse {
    auto_scroll: bool,
    scroll: Option<ScrollRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TextSizeRequest {
    size: TextSize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSizeResponse {
    text_size: TextSize,
    scale: f64,
}

fn control(ctx: &AppContext, accepted: bool) -> Json<ControlResponse> {
    Json(ControlResponse {
        accepted,
        state: ctx.player.engine().snapshot(),
    })
}

fn not_seekable() -> ApiError {
    (
        StatusCode::CONFLICT,
        StatusResponse::new("Playback is not seekable in the current state"),
    )
}

/// Map player errors to HTTP statuses
fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Service(_) | Error::Client(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (status, StatusResponse::new(e.to_string()))
}

// ============================================================================
// Health & Build Info
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "lectern-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_id: ctx.player.session_id().to_string(),
        port: ctx.port,
        uptime_secs: (chrono::Utc::now() - ctx.started_at).num_seconds(),
    })
}

/// GET /build_info
pub async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Playback Control
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackSnapshot> {
    Json(ctx.player.engine().snapshot())
}

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> Json<ControlResponse> {
    let accepted = ctx.player.engine().play().await;
    control(&ctx, accepted)
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Json<ControlResponse> {
    ctx.player.engine().pause().await;
    control(&ctx, true)
}

/// POST /playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> Json<ControlResponse> {
    let accepted = ctx.player.engine().toggle_play().await;
    control(&ctx, accepted)
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<ControlResponse> {
    ctx.player
        .engine()
        .seek(req.position)
        .await
        .ok_or_else(not_seekable)?;
    Ok(control(&ctx, true))
}

/// POST /playback/skip-forward (body optional)
pub async fn skip_forward(
    State(ctx): State<AppContext>,
    req: Option<Json<SkipRequest>>,
) -> ApiResult<ControlResponse> {
    let seconds = req.and_then(|Json(r)| r.seconds);
    ctx.player
        .engine()
        .skip_forward(seconds)
        .await
        .ok_or_else(not_seekable)?;
    Ok(control(&ctx, true))
}

/// POST /playback/skip-backward (body optional)
pub async fn skip_backward(
    State(ctx): State<AppContext>,
    req: Option<Json<SkipRequest>>,
) -> ApiResult<ControlResponse> {
    let seconds = req.and_then(|Json(r)| r.seconds);
    ctx.player
        .engine()
        .skip_backward(seconds)
        .await
        .ok_or_else(not_seekable)?;
    Ok(control(&ctx, true))
}

/// POST /playback/rate
pub async fn set_playback_rate(
    State(ctx): State<AppContext>,
    Json(req): Json<RateRequest>,
) -> Json<ControlResponse> {
    ctx.player.engine().change_playback_rate(req.rate).await;
    control(&ctx, true)
}

// ============================================================================
// Audio
// ============================================================================

/// POST /audio/volume
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Json<ControlResponse> {
    ctx.player.engine().change_volume(req.volume).await;
    control(&ctx, true)
}

/// POST /audio/mute/toggle
pub async fn toggle_mute(State(ctx): State<AppContext>) -> Json<ControlResponse> {
    ctx.player.engine().toggle_mute().await;
    control(&ctx, true)
}

// ============================================================================
// Collection & Selection
// ============================================================================

/// GET /collection
pub async fn get_collection(State(ctx): State<AppContext>) -> Json<CollectionResponse> {
    let items = ctx.player.collection().await;
    Json(CollectionResponse {
        item_count: items.len(),
        items,
    })
}

/// POST /collection - fetch from the content service and install
pub async fn load_collection(
    State(ctx): State<AppContext>,
    Json(req): Json<LoadCollectionRequest>,
) -> ApiResult<CollectionResponse> {
    info!("Loading collection {}", req.collection_id);
    ctx.player
        .load_collection(&req.collection_id)
        .await
        .map_err(error_response)?;
    Ok(get_collection(State(ctx)).await)
}

/// PUT /collection - install the given items
pub async fn put_collection(
    State(ctx): State<AppContext>,
    Json(req): Json<PutCollectionRequest>,
) -> Json<CollectionResponse> {
    ctx.player.set_collection(req.items).await;
    get_collection(State(ctx)).await
}

/// POST /items/:item_id/select (body optional)
pub async fn select_item(
    State(ctx): State<AppContext>,
    Path(item_id): Path<String>,
    req: Option<Json<SelectRequest>>,
) -> ApiResult<ControlResponse> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let accepted = ctx
        .player
        .select_item(
            &item_id,
            SelectOptions {
                autoplay: req.autoplay,
                resume_at: req.resume_at,
            },
        )
        .await
        .map_err(error_response)?;
    Ok(control(&ctx, accepted))
}

// ============================================================================
// Read-along
// ============================================================================

/// GET /readalong
pub async fn get_read_along(State(ctx): State<AppContext>) -> Json<ReadAlongView> {
    Json(ctx.player.synchronizer().view().await)
}

/// GET /readalong/segments/:index/active
pub async fn is_segment_active(
    State(ctx): State<AppContext>,
    Path(segment_index): Path<usize>,
) -> Json<SegmentActiveResponse> {
    let active = ctx.player.synchronizer().is_segment_active(segment_index).await;
    Json(SegmentActiveResponse { segment_index, active })
}

/// POST /readalong/segments/:index/seek
pub async fn seek_to_segment(
    State(ctx): State<AppContext>,
    Path(segment_index): Path<usize>,
) -> ApiResult<ControlResponse> {
    let start = ctx
        .player
        .synchronizer()
        .seek_to_segment(segment_index)
        .await
        .ok_or_else(|| error_response(Error::NotFound(format!("Segment {}", segment_index))))?;
    ctx.player.engine().seek(start).await.ok_or_else(not_seekable)?;
    Ok(control(&ctx, true))
}

/// POST /readalong/auto-scroll
pub async fn set_auto_scroll(
    State(ctx): State<AppContext>,
    Json(req): Json<AutoScrollRequest>,
) -> Json<AutoScrollResponse> {
    let scroll = ctx.player.synchronizer().set_auto_scroll(req.enabled).await;
    Json(AutoScrollResponse {
        auto_scroll: req.enabled,
        scroll,
    })
}

/// POST /readalong/text-size
pub async fn set_text_size(
    State(ctx): State<AppContext>,
    Json(req): Json<TextSizeRequest>,
) -> Json<TextSizeResponse> {
    ctx.player.synchronizer().set_text_size(req.size).await;
    Json(TextSizeResponse {
        text_size: req.size,
        scale: req.size.scale(),
    })
}

/// POST /readalong/viewport
pub async fn update_viewport(
    State(ctx): State<AppContext>,
    Json(viewport): Json<Viewport>,
) -> StatusCode {
    ctx.player.synchronizer().update_viewport(viewport).await;
    StatusCode::NO_CONTENT
}

/// POST /readalong/layout
pub async fn update_layout(
    State(ctx): State<AppContext>,
    Json(bounds): Json<Vec<SegmentBounds>>,
) -> StatusCode {
    ctx.player.synchronizer().update_layout(bounds).await;
    StatusCode::NO_CONTENT
}
