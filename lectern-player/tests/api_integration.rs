//! Integration tests for the HTTP control surface
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

mod helpers;

use axum::body::Body;
use axum::Router;
use helpers::{collection, player, TestServices};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use lectern_player::api::{create_router, AppContext};
use lectern_player::PlayerContext;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (Router, PlayerContext, TestServices) {
    let services = TestServices::new();
    let (player, _backend) = player(&services);
    let router = create_router(AppContext::new(player.clone(), 5740));
    (router, player, services)
}

async fn request(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Option<Value>) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, json)
}

async fn with_collection() -> (Router, PlayerContext) {
    let (app, player, _services) = setup().await;
    player.set_collection(collection(3)).await;
    (app, player)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, player, _services) = setup().await;

    let (status, body) = request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "lectern-player");
    assert_eq!(body["port"], 5740);
    assert_eq!(body["sessionId"], player.session_id().to_string());
}

#[tokio::test]
async fn test_build_info_endpoint() {
    let (app, _player, _services) = setup().await;

    let (status, body) = request(&app, Method::GET, "/build_info", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert!(body["git_hash"].is_string());
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_initial_state_is_idle() {
    let (app, _player, _services) = setup().await;

    let (status, body) = request(&app, Method::GET, "/playback/state", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "idle");
    assert_eq!(body["isPlaying"], false);
    assert_eq!(body["volume"], 1.0);
    assert_eq!(body["itemId"], Value::Null);
}

#[tokio::test]
async fn test_select_and_play() {
    let (app, _player) = with_collection().await;

    let (status, body) = request(&app, Method::POST, "/items/ch-1/select", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["state"]["itemId"], "ch-1");
    assert_eq!(body["state"]["status"], "ready");

    let (status, body) = request(&app, Method::POST, "/playback/play", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["state"]["isPlaying"], true);

    let (_, body) = request(&app, Method::POST, "/playback/toggle", None).await;
    assert_eq!(body.unwrap()["state"]["status"], "paused");
}

#[tokio::test]
async fn test_select_with_resume_offset() {
    let (app, _player) = with_collection().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/items/ch-0/select",
        Some(json!({ "resumeAt": 25.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["state"]["currentTime"], 25.5);
}

#[tokio::test]
async fn test_select_unknown_item_is_not_found() {
    let (app, _player) = with_collection().await;

    let (status, body) = request(&app, Method::POST, "/items/nope/select", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.unwrap()["status"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_seek_and_skips() {
    let (app, _player) = with_collection().await;
    request(&app, Method::POST, "/items/ch-0/select", None).await;

    let (status, body) = request(&app, Method::POST, "/playback/seek", Some(json!({ "position": 50.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["state"]["currentTime"], 50.0);

    // empty body uses the configured 30 s, clamped to the duration
    let (_, body) = request(&app, Method::POST, "/playback/skip-forward", None).await;
    assert_eq!(body.unwrap()["state"]["currentTime"], 60.0);

    let (_, body) = request(&app, Method::POST, "/playback/skip-backward", Some(json!({ "seconds": 5.0 }))).await;
    assert_eq!(body.unwrap()["state"]["currentTime"], 55.0);
}

#[tokio::test]
async fn test_seek_without_item_conflicts() {
    let (app, _player, _services) = setup().await;

    let (status, _) = request(&app, Method::POST, "/playback/seek", Some(json!({ "position": 5.0 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_audio_controls_are_clamped() {
    let (app, _player) = with_collection().await;

    let (_, body) = request(&app, Method::POST, "/audio/volume", Some(json!({ "volume": 4.0 }))).await;
    assert_eq!(body.unwrap()["state"]["volume"], 1.0);

    let (_, body) = request(&app, Method::POST, "/playback/rate", Some(json!({ "rate": 0.1 }))).await;
    assert_eq!(body.unwrap()["state"]["playbackRate"], 0.5);

    let (_, body) = request(&app, Method::POST, "/audio/mute/toggle", None).await;
    assert_eq!(body.unwrap()["state"]["isMuted"], true);
}

#[tokio::test]
async fn test_collection_endpoints() {
    let (app, _player, _services) = setup().await;

    let (status, body) = request(&app, Method::POST, "/collection", Some(json!({ "collectionId": "book" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["itemCount"], 4);

    let (status, _) = request(&app, Method::POST, "/collection", Some(json!({ "collectionId": "other" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let items = json!({ "items": [
        { "id": "x", "title": "X", "durationSeconds": 12.0, "audioUrl": "mem://x.mp3" }
    ]});
    let (status, body) = request(&app, Method::PUT, "/collection", Some(items)).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["itemCount"], 1);
    assert_eq!(body["items"][0]["id"], "x");

    let (status, _) = request(&app, Method::POST, "/items/x/select", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_read_along_settings() {
    let (app, _player, _services) = setup().await;

    let (status, body) = request(&app, Method::GET, "/readalong", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["hasReadAlong"], false);
    assert_eq!(body["autoScroll"], true);
    assert_eq!(body["textSize"], "medium");

    let (_, body) = request(&app, Method::POST, "/readalong/text-size", Some(json!({ "size": "xlarge" }))).await;
    let body = body.unwrap();
    assert_eq!(body["textSize"], "xlarge");
    assert_eq!(body["scale"], 1.5);

    let (status, _) = request(&app, Method::POST, "/readalong/text-size", Some(json!({ "size": "huge" }))).await;
    assert!(status.is_client_error());

    let (_, body) = request(&app, Method::POST, "/readalong/auto-scroll", Some(json!({ "enabled": false }))).await;
    let body = body.unwrap();
    assert_eq!(body["autoScroll"], false);
    assert_eq!(body["scroll"], Value::Null);

    let (status, body) = request(
        &app,
        Method::POST,
        "/readalong/viewport",
        Some(json!({ "top": 0.0, "height": 600.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());

    let (status, _) = request(
        &app,
        Method::POST,
        "/readalong/layout",
        Some(json!([{ "segmentIndex": 0, "top": 10.0, "height": 30.0 }])),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_segment_endpoints_with_read_along() {
    let (app, player) = with_collection().await;
    let sync = player.synchronizer();
    sync.begin_item("ch-0").await;
    sync.load(helpers::read_along("ch-0")).await;
    request(&app, Method::POST, "/items/ch-0/select", Some(json!({ "resumeAt": 0.0 }))).await;

    let (status, body) = request(&app, Method::POST, "/readalong/segments/1/seek", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["state"]["currentTime"], 5.0);

    let (status, _) = request(&app, Method::POST, "/readalong/segments/9/seek", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = request(&app, Method::GET, "/readalong/segments/1/active", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["segmentIndex"], 1);
    // no observers running, so nothing was highlighted
    assert_eq!(body["active"], false);
}
