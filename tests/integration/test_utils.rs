//! Shared test utilities for integration tests
//!
//! Isolates config-related environment variables so tests that load layered
//! configuration do not see the developer's own files.

use layover::cache::{ConsistencyPolicy, OverlayCache};
use layover::compositor::{Compositor, CompositorOptions, Surface};
use layover::overlay::{NewOverlay, Overlay, OverlayId, StreamId};
use layover::store::InMemoryOverlayStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Serializes environment variable access across all tests in this binary.
static CONFIG_ENV_MUTEX: Mutex<()> = Mutex::new(());

const TRACKED_VARS: [&str; 4] = [
    "HOME",
    "XDG_CONFIG_HOME",
    "LAYOVER_ENV",
    "LAYOVER__STORE__BASE_URL",
];

/// Environment variable state to restore after test
struct EnvState {
    values: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            values: TRACKED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.values {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`, restoring the
/// original environment afterwards.
///
/// The global config file for the duration is
/// `{test_dir}/config/layover/config.toml`.
pub fn with_config_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    let test_config_home = test_dir.path().join("config");
    std::fs::create_dir_all(&test_home).unwrap();
    std::fs::create_dir_all(&test_config_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    std::env::remove_var("LAYOVER_ENV");
    std::env::remove_var("LAYOVER__STORE__BASE_URL");

    let result = f();

    env_state.restore();
    result
}

pub fn s1() -> StreamId {
    StreamId::from("s1")
}

pub fn text_overlay(id: &str, content: &str) -> Overlay {
    NewOverlay::text("s1", content).into_overlay(OverlayId::from(id))
}

pub fn options() -> CompositorOptions {
    CompositorOptions {
        poll_interval: Duration::from_secs(5),
        handle_hide_delay: Duration::from_millis(300),
    }
}

/// Mount a compositor for stream `s1` over `store`.
pub async fn mount(store: &Arc<InMemoryOverlayStore>, policy: ConsistencyPolicy) -> Compositor {
    let cache = OverlayCache::shared(store.clone(), policy);
    Compositor::mount(cache, s1(), Surface::new(1280, 720), options()).await
}

/// Yield until `condition` holds, so spawned persist tasks can reach the store.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
