//! Read-along overlay driven by real playback through the player context

mod helpers;

use helpers::{collection, play_for, player, wait_until, TestServices};
use lectern_common::events::LecternEvent;
use lectern_player::SelectOptions;

#[tokio::test]
async fn test_highlight_follows_playback() {
    let services = TestServices::new();
    let (player, backend) = player(&services);
    player.set_collection(collection(3)).await;
    player.start().await;

    player.select_item("ch-0", SelectOptions::default()).await.unwrap();
    let sync = player.synchronizer().clone();
    wait_until("read-along data", || async { sync.view().await.has_read_along }).await;

    player.engine().play().await;
    play_for(&backend, 1.0, 0.25).await;
    wait_until("first sentence", || async { sync.active_segment().await == Some(0) }).await;

    play_for(&backend, 6.0, 0.25).await;
    wait_until("second sentence", || async { sync.active_segment().await == Some(1) }).await;
    assert!(sync.is_segment_active(1).await);
    assert!(!sync.is_segment_active(0).await);
}

#[tokio::test]
async fn test_seek_to_segment_moves_playback() {
    let services = TestServices::new();
    let (player, _backend) = player(&services);
    player.set_collection(collection(3)).await;
    player.start().await;

    player.select_item("ch-0", SelectOptions::default()).await.unwrap();
    let sync = player.synchronizer().clone();
    wait_until("read-along data", || async { sync.view().await.has_read_along }).await;

    let start = sync.seek_to_segment(2).await.unwrap();
    assert_eq!(start, 12.0);
    assert_eq!(player.engine().seek(start).await, Some(12.0));

    // the Seeked event moves the highlight without playback
    wait_until("third sentence", || async { sync.active_segment().await == Some(2) }).await;
}

#[tokio::test]
async fn test_item_without_read_along_is_audio_only() {
    let services = TestServices::new();
    let (player, _backend) = player(&services);
    player.set_collection(collection(3)).await;
    let mut view = player.bind_view();
    player.start().await;

    player.select_item("ch-2", SelectOptions::default()).await.unwrap();

    loop {
        if let LecternEvent::ReadAlongLoaded { item_id, has_read_along, segment_count, .. } =
            view.events().recv().await.unwrap()
        {
            assert_eq!(item_id, "ch-2");
            assert!(!has_read_along);
            assert_eq!(segment_count, 0);
            break;
        }
    }
    assert!(player.synchronizer().view().await.sentences.is_empty());
    assert_eq!(view.snapshot().item_id.as_deref(), Some("ch-2"));
}

#[tokio::test]
async fn test_read_along_failure_degrades_and_is_retried() {
    let services = TestServices::new();
    services.read_along.set_failing(true);
    let (player, _backend) = player(&services);
    player.set_collection(collection(3)).await;
    player.start().await;

    player.select_item("ch-0", SelectOptions::default()).await.unwrap();
    let read_along = player.read_along().clone();
    wait_until("first fetch", || async { services.read_along.calls() == 1 }).await;
    assert!(!player.synchronizer().view().await.has_read_along);
    assert!(read_along.cached("ch-0").await.is_none());

    services.read_along.set_failing(false);
    player.select_item("ch-1", SelectOptions::default()).await.unwrap();
    player.select_item("ch-0", SelectOptions::default()).await.unwrap();

    let sync = player.synchronizer().clone();
    wait_until("retried fetch", || async {
        let view = sync.view().await;
        view.has_read_along && view.item_id.as_deref() == Some("ch-0")
    })
    .await;
    assert!(read_along.cached("ch-0").await.is_some());
    assert_eq!(services.read_along.calls(), 3);
}

#[tokio::test]
async fn test_preloader_targets_follow_selection() {
    let services = TestServices::new();
    let (player, backend) = player(&services);
    player.set_collection(collection(4)).await;
    player.start().await;

    player.select_item("ch-1", SelectOptions::default()).await.unwrap();
    let preloader = player.preloader().clone();
    wait_until("preload targets", || async {
        preloader.targets().await == vec!["ch-2".to_string(), "ch-3".to_string()]
    })
    .await;
    assert_eq!(
        backend.prefetched().await,
        vec!["mem://ch-2.mp3".to_string(), "mem://ch-3.mp3".to_string()]
    );

    // the last item has nothing to warm
    player.select_item("ch-3", SelectOptions::default()).await.unwrap();
    wait_until("no targets", || async { preloader.targets().await.is_empty() }).await;
    // current resource untouched by preloading
    assert_eq!(player.engine().snapshot().item_id.as_deref(), Some("ch-3"));
}
