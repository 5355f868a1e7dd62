//! Property-based tests for id uniqueness and geometry positivity

use async_trait::async_trait;
use layover::cache::{ConsistencyPolicy, OverlayCache};
use layover::error::StoreError;
use layover::geometry::{
    GeometryController, Handle, InteractionFrame, Point, MAX_FONT_SIZE, MIN_FONT_SIZE,
};
use layover::overlay::{NewOverlay, Overlay, OverlayId, OverlayPatch, StreamId};
use layover::store::{InMemoryOverlayStore, OverlayStore};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Store whose listing is fixed up front, duplicates included.
struct FixedListStore {
    listed: Vec<Overlay>,
}

#[async_trait]
impl OverlayStore for FixedListStore {
    async fn list(&self, _stream_id: &StreamId) -> Result<Vec<Overlay>, StoreError> {
        Ok(self.listed.clone())
    }

    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, StoreError> {
        Ok(overlay.clone().into_overlay(OverlayId::from("created")))
    }

    async fn update(&self, _id: &OverlayId, _patch: &OverlayPatch) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _id: &OverlayId) -> Result<(), StoreError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn assert_unique(cache: &OverlayCache) {
    let snapshot = cache.snapshot();
    let ids: HashSet<&OverlayId> = snapshot.iter().map(|o| &o.id).collect();
    assert_eq!(ids.len(), snapshot.len(), "duplicate ids in {:?}", snapshot);
}

#[derive(Debug, Clone)]
enum CacheOp {
    Load,
    Add(String),
    Move(usize, i32, i32),
    Remove(usize),
}

fn cache_op() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        Just(CacheOp::Load),
        "[a-z]{1,8}".prop_map(CacheOp::Add),
        (0usize..8, -500i32..2000, -500i32..2000).prop_map(|(i, x, y)| CacheOp::Move(i, x, y)),
        (0usize..8).prop_map(CacheOp::Remove),
    ]
}

proptest! {
    #[test]
    fn test_load_never_admits_duplicate_ids(ids in prop::collection::vec(0u8..6, 0..20)) {
        let listed = ids
            .iter()
            .map(|n| {
                NewOverlay::text("s1", format!("n{}", n))
                    .into_overlay(OverlayId::new(format!("id{}", n)))
            })
            .collect();
        let cache = OverlayCache::new(
            Arc::new(FixedListStore { listed }),
            ConsistencyPolicy::default(),
        );

        runtime().block_on(cache.load(&StreamId::from("s1"))).unwrap();

        assert_unique(&cache);
        let distinct: HashSet<u8> = ids.iter().copied().collect();
        prop_assert_eq!(cache.len(), distinct.len());
    }

    #[test]
    fn test_operation_sequences_keep_ids_unique(ops in prop::collection::vec(cache_op(), 1..30)) {
        let store = Arc::new(InMemoryOverlayStore::new());
        let cache = OverlayCache::new(store.clone(), ConsistencyPolicy::OptimisticWithRollback);
        let stream = StreamId::from("s1");

        runtime().block_on(async {
            cache.load(&stream).await.unwrap();
            for op in ops {
                match op {
                    CacheOp::Load => {
                        cache.load(&stream).await.unwrap();
                    }
                    CacheOp::Add(text) => {
                        cache.add(NewOverlay::text("s1", text)).await.unwrap();
                    }
                    CacheOp::Move(index, x, y) => {
                        if let Some(target) = cache.snapshot().get(index) {
                            cache.update(&target.id, OverlayPatch::position(x, y)).await.unwrap();
                        }
                    }
                    CacheOp::Remove(index) => {
                        if let Some(target) = cache.snapshot().get(index) {
                            cache.remove(&target.id).await.unwrap();
                        }
                    }
                }
                assert_unique(&cache);
            }
        });

        prop_assert_eq!(cache.snapshot(), store.overlays(&stream));
    }
}

fn handle() -> impl Strategy<Value = Handle> {
    prop::sample::select(Handle::ALL.to_vec())
}

/// Any resize, however far past the opposite corner, commits a positive size.
#[test]
fn test_resize_commits_are_always_positive() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                handle(),
                prop::collection::vec((-3000.0f64..3000.0, -3000.0f64..3000.0), 1..6),
                1i32..400,
                1i32..400,
            ),
            |(handle, moves, width, height)| {
                let overlay = NewOverlay::text("s1", "resize me")
                    .sized(width, height)
                    .into_overlay(OverlayId::from("o1"));
                let mut controller = GeometryController::new(overlay, Duration::from_millis(300));

                controller.handle_down(handle, Point::new(0.0, 0.0));
                for (dx, dy) in moves {
                    controller.pointer_move(Point::new(dx, dy));
                    let frame = controller.frame();
                    prop_assert!(frame.width >= 1.0 && frame.height >= 1.0);
                }
                if let Some(commit) = controller.pointer_up() {
                    let size = commit.patch.size.expect("resize commits carry a size");
                    prop_assert!(size.width > 0 && size.height > 0);
                    prop_assert!(commit.patch.validate().is_ok());
                }
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_font_size_stays_within_bounds() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0.0f64..5000.0, 0.0f64..5000.0), |(width, height)| {
            let frame = InteractionFrame {
                translate_x: 0.0,
                translate_y: 0.0,
                width,
                height,
            };
            let size = frame.font_size();
            prop_assert!((MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size));
            Ok(())
        })
        .unwrap();
}
