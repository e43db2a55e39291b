//! Switching items while work for the previous one is still in flight

mod helpers;

use helpers::{collection, engine, item, play_for, player, wait_until, TestServices};
use lectern_common::events::PlaybackStatus;
use lectern_player::config::AutoplayPolicy;
use lectern_player::playback::LoadOptions;
use lectern_player::SelectOptions;
use std::sync::Arc;

#[tokio::test]
async fn test_pending_play_is_discarded_when_item_changes() {
    let (backend, engine) = engine(AutoplayPolicy::Allow);
    engine.load(item("ch-0", 60.0), LoadOptions::default()).await;
    backend.hold_starts();

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.play().await })
    };
    wait_until("start to park", || async { backend.pending_starts() == 1 }).await;

    engine.load(item("ch-1", 60.0), LoadOptions::default()).await;
    backend.release_starts();

    assert!(!pending.await.unwrap());
    engine.pump_events().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.item_id.as_deref(), Some("ch-1"));
    assert_eq!(snapshot.status, PlaybackStatus::Ready);
    assert!(!snapshot.is_playing);
    assert!(!backend.is_playing().await);
    assert_eq!(backend.current_url().await.as_deref(), Some("mem://ch-1.mp3"));
}

#[tokio::test]
async fn test_pending_play_is_discarded_by_pause() {
    let (backend, engine) = engine(AutoplayPolicy::Allow);
    engine.load(item("ch-0", 60.0), LoadOptions::default()).await;
    backend.hold_starts();

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.play().await })
    };
    wait_until("start to park", || async { backend.pending_starts() == 1 }).await;

    engine.pause().await;
    backend.release_starts();

    assert!(!pending.await.unwrap());
    assert!(!engine.snapshot().is_playing);
    assert!(!backend.is_playing().await);

    // a fresh play afterwards works normally
    assert!(engine.play().await);
}

#[tokio::test]
async fn test_switch_resets_time_and_drops_stale_updates() {
    let (backend, engine) = engine(AutoplayPolicy::Allow);
    engine.load(item("ch-0", 60.0), LoadOptions::default()).await;
    engine.play().await;
    play_for(&backend, 5.0, 0.25).await;

    // ch-0 time updates are still queued when ch-1 loads
    engine.load(item("ch-1", 60.0), LoadOptions::default()).await;
    assert_eq!(engine.snapshot().current_time, 0.0);

    engine.pump_events().await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.item_id.as_deref(), Some("ch-1"));
    assert_eq!(snapshot.current_time, 0.0);
    assert_eq!(snapshot.status, PlaybackStatus::Ready);
}

#[tokio::test]
async fn test_no_progress_written_for_previous_item_after_switch() {
    let services = TestServices::new();
    let (player, backend) = player(&services);
    player.set_collection(collection(3)).await;
    player.start().await;

    player.select_item("ch-0", SelectOptions::default()).await.unwrap();
    assert!(player.engine().play().await);
    play_for(&backend, 15.0, 0.25).await;
    wait_until("first progress write", || async { services.progress.records().len() == 1 }).await;

    player.select_item("ch-1", SelectOptions::default()).await.unwrap();
    assert_eq!(player.engine().snapshot().current_time, 0.0);
    assert!(player.engine().play().await);
    play_for(&backend, 12.0, 0.25).await;
    wait_until("second progress write", || async { services.progress.records().len() == 2 }).await;

    let records = services.progress.records();
    assert_eq!(records[0].item_id, "ch-0");
    assert_eq!(records[0].current_time, 10.0);
    assert_eq!(records[1].item_id, "ch-1");
    assert_eq!(records[1].current_time, 10.0);
    assert!(records.iter().all(|r| !r.is_completed));
}

#[tokio::test]
async fn test_pause_during_resource_creation_cancels_play() {
    let (backend, engine) = engine(AutoplayPolicy::Allow);
    engine.load(item("ch-0", 60.0), LoadOptions::default()).await;
    backend.hold_creation();

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.play().await })
    };
    wait_until("creation to park", || async { backend.pending_creations() == 1 }).await;

    engine.pause().await;
    backend.release_creation();

    assert!(!pending.await.unwrap());
    engine.pump_events().await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, PlaybackStatus::Ready);
    assert!(!snapshot.is_playing);
    assert!(!backend.is_playing().await);

    // the resource exists now, the next play starts right away
    assert!(backend.has_resource().await);
    assert!(engine.play().await);
    assert!(backend.is_playing().await);
}
