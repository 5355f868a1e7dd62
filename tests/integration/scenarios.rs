//! End-to-end overlay flows through the cache and compositor over the
//! in-memory store.

use crate::integration::test_utils::{mount, s1, text_overlay, wait_until};
use layover::cache::{CacheStatus, ConsistencyPolicy, OverlayCache, DELETE_FAILED};
use layover::error::StoreError;
use layover::geometry::Point;
use layover::overlay::{NewOverlay, OverlayId, OverlayKind, OverlayPatch, Position, Size};
use layover::store::{InMemoryOverlayStore, StoreCall, StoreOp};
use std::sync::Arc;
use std::time::Instant;

#[tokio::test]
async fn test_empty_stream_loads_ready() {
    let store = Arc::new(InMemoryOverlayStore::new());
    let cache = OverlayCache::new(store.clone(), ConsistencyPolicy::default());

    cache.load(&s1()).await.unwrap();

    assert_eq!(cache.status(), CacheStatus::Ready);
    assert!(cache.snapshot().is_empty());
}

#[tokio::test]
async fn test_added_text_overlay_renders_with_defaults() {
    let store = Arc::new(InMemoryOverlayStore::new());
    let cache = OverlayCache::new(store.clone(), ConsistencyPolicy::default());
    cache
        .add(
            NewOverlay::text("s1", "Hello")
                .at(50, 50)
                .sized(200, 60),
        )
        .await
        .unwrap();

    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let rendered = compositor.render(Instant::now());

    assert_eq!(rendered.len(), 1);
    let overlay = &rendered[0];
    assert_eq!(overlay.id, OverlayId::from("o1"));
    assert_eq!(overlay.kind, OverlayKind::Text);
    assert_eq!(overlay.content, "Hello");
    assert_eq!(overlay.frame.position(), Position::new(50, 50));
    assert_eq!(overlay.frame.size(), Size { width: 200, height: 60 });
    compositor.unmount().await;
}

#[tokio::test]
async fn test_drag_issues_exactly_one_update_on_release() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![text_overlay("o1", "Hello")]));
    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let id = OverlayId::from("o1");

    compositor.pointer_down(&id, Point::new(60.0, 60.0));
    for step in 1..=7 {
        let t = step as f64 * 10.0;
        compositor.pointer_move(&id, Point::new(60.0 + t, 60.0 + t * 30.0 / 70.0));
        compositor.render(Instant::now());
    }
    compositor.pointer_move(&id, Point::new(130.0, 90.0));
    tokio::task::yield_now().await;
    assert_eq!(store.count(StoreOp::Update), 0, "no store call during the drag");

    let commit = compositor.pointer_up(&id).unwrap();
    assert_eq!(commit.patch, OverlayPatch::position(120, 80));
    assert!(compositor.settle().await.is_empty());

    let updates: Vec<StoreCall> = store
        .calls()
        .into_iter()
        .filter(|call| call.op() == StoreOp::Update)
        .collect();
    assert_eq!(
        updates,
        vec![StoreCall::Update(id.clone(), OverlayPatch::position(120, 80))]
    );
    assert_eq!(store.overlays(&s1())[0].position, Position::new(120, 80));
    compositor.unmount().await;
}

#[tokio::test]
async fn test_failed_delete_without_rollback_stays_removed() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![text_overlay("o1", "Hello")]));
    store.fail_next(StoreOp::Delete, StoreError::network("connection reset"));
    let mut compositor = mount(&store, ConsistencyPolicy::OptimisticNoRollback).await;

    compositor.delete(&OverlayId::from("o1")).unwrap();
    assert!(compositor.render(Instant::now()).is_empty());

    let failures = compositor.settle().await;
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_network());

    assert!(compositor.render(Instant::now()).is_empty());
    assert_eq!(
        compositor.cache().status(),
        CacheStatus::Error(DELETE_FAILED.to_string())
    );
    compositor.unmount().await;
}

#[tokio::test]
async fn test_failed_delete_with_rollback_reappears_in_place() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![
        text_overlay("a", "first"),
        text_overlay("b", "second"),
        text_overlay("c", "third"),
    ]));
    store.fail_next(StoreOp::Delete, StoreError::rejected(500, "boom"));
    let mut compositor = mount(&store, ConsistencyPolicy::OptimisticWithRollback).await;

    compositor.delete(&OverlayId::from("b")).unwrap();
    assert_eq!(compositor.render(Instant::now()).len(), 2);
    compositor.settle().await;

    let ids: Vec<String> = compositor
        .render(Instant::now())
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    compositor.unmount().await;
}

#[tokio::test]
async fn test_update_visible_before_store_resolves() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![text_overlay("o1", "Hello")]));
    store.hold(StoreOp::Update);
    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let cache = compositor.cache().clone();

    let pending = tokio::spawn(async move {
        cache
            .update(&OverlayId::from("o1"), OverlayPatch::position(10, 20))
            .await
    });
    wait_until(|| store.count(StoreOp::Update) == 1).await;

    let rendered = compositor.render(Instant::now());
    assert_eq!(rendered[0].frame.position(), Position::new(10, 20));
    assert!(!pending.is_finished());

    store.release(StoreOp::Update);
    pending.await.unwrap().unwrap();
    compositor.unmount().await;
}

#[tokio::test]
async fn test_unchanged_edit_issues_no_store_call() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![text_overlay("o1", "Hello")]));
    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let id = OverlayId::from("o1");

    assert!(compositor.begin_edit(&id));
    assert!(compositor.render(Instant::now())[0].editing);
    assert!(compositor.finish_edit(&id, "Hello").is_none());
    assert!(compositor.settle().await.is_empty());
    assert_eq!(store.count(StoreOp::Update), 0);

    assert!(compositor.begin_edit(&id));
    assert!(compositor.finish_edit(&id, "Hello, world").is_some());
    compositor.settle().await;
    assert_eq!(store.overlays(&s1())[0].content, "Hello, world");
    compositor.unmount().await;
}

#[tokio::test]
async fn test_refresh_mid_drag_keeps_drag_position() {
    let store = Arc::new(InMemoryOverlayStore::with_overlays(vec![text_overlay("o1", "Hello")]));
    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let id = OverlayId::from("o1");

    compositor.pointer_down(&id, Point::new(60.0, 60.0));
    compositor.pointer_move(&id, Point::new(160.0, 110.0));

    // Another session moves it meanwhile; the reload brings that back.
    store.patch(&id, &OverlayPatch::position(400, 300));
    compositor.refresh().await.unwrap();

    let rendered = compositor.render(Instant::now());
    assert_eq!(rendered[0].frame.position(), Position::new(150, 100));

    let commit = compositor.pointer_up(&id).unwrap();
    assert_eq!(commit.patch, OverlayPatch::position(150, 100));
    compositor.settle().await;
    assert_eq!(store.overlays(&s1())[0].position, Position::new(150, 100));
    compositor.unmount().await;
}

#[tokio::test]
async fn test_image_overlay_has_no_font_and_no_edit() {
    let store = Arc::new(InMemoryOverlayStore::new());
    let cache = OverlayCache::new(store.clone(), ConsistencyPolicy::default());
    let created = cache
        .add(NewOverlay::image("s1", "https://cdn.example.com/logo.png"))
        .await
        .unwrap();

    let mut compositor = mount(&store, ConsistencyPolicy::default()).await;
    let rendered = compositor.render(Instant::now());
    assert_eq!(rendered[0].font_size, None);
    assert_eq!(rendered[0].frame.position(), Position::new(100, 100));
    assert!(!compositor.begin_edit(&created.id));
    compositor.unmount().await;
}
