//! Integration tests for layered configuration

use crate::integration::test_utils::with_config_env;
use layover::cache::ConsistencyPolicy;
use layover::compositor::CompositorOptions;
use layover::config::ConfigLoader;
use layover::store::{HttpOverlayStore, OverlayStore};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_defaults_without_any_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let config = with_config_env(&test_dir, || ConfigLoader::load(&workspace).unwrap());

    assert_eq!(config.store.base_url, "http://localhost:5000/api");
    assert_eq!(config.compositor.consistency, ConsistencyPolicy::OptimisticWithRollback);
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_specific_workspace_file_wins() {
    let test_dir = TempDir::new().unwrap();
    let workspace = test_dir.path().join("workspace");
    let config_dir = workspace.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
[compositor]
poll_interval_ms = 2000
handle_hide_delay_ms = 500
"#,
    )
    .unwrap();
    std::fs::write(
        config_dir.join("staging.toml"),
        r#"
[compositor]
poll_interval_ms = 750
consistency = "optimistic_no_rollback"
"#,
    )
    .unwrap();

    let config = with_config_env(&test_dir, || {
        std::env::set_var("LAYOVER_ENV", "staging");
        ConfigLoader::load(&workspace).unwrap()
    });

    assert_eq!(config.compositor.poll_interval_ms, 750);
    assert_eq!(config.compositor.handle_hide_delay_ms, 500);
    assert_eq!(config.compositor.consistency, ConsistencyPolicy::OptimisticNoRollback);

    let options = CompositorOptions::from(&config.compositor);
    assert_eq!(options.poll_interval, Duration::from_millis(750));
    assert_eq!(options.handle_hide_delay, Duration::from_millis(500));
}

#[test]
fn test_environment_variable_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let global_dir = test_dir.path().join("config").join("layover");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        r#"
[store]
base_url = "http://global.example.com/api"
connect_timeout_secs = 3
"#,
    )
    .unwrap();
    let workspace = test_dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let config = with_config_env(&test_dir, || {
        std::env::set_var("LAYOVER__STORE__BASE_URL", "https://env.example.com/v2");
        ConfigLoader::load(&workspace).unwrap()
    });

    assert_eq!(config.store.base_url, "https://env.example.com/v2");
    assert_eq!(config.store.connect_timeout_secs, 3);

    let store = HttpOverlayStore::from_config(&config.store).unwrap();
    assert_eq!(store.describe(), "https://env.example.com/v2");
}

#[test]
fn test_invalid_values_fail_validation() {
    let test_dir = TempDir::new().unwrap();
    let config_file = test_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[store]
base_url = "not a url"
request_timeout_secs = 0
"#,
    )
    .unwrap();

    let config = with_config_env(&test_dir, || ConfigLoader::load_from_file(&config_file).unwrap());
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1, "store problems are reported together: {:?}", errors);
    assert!(errors[0].to_string().starts_with("Store:"));
}

#[test]
fn test_unknown_consistency_policy_is_a_load_error() {
    let test_dir = TempDir::new().unwrap();
    let config_file = test_dir.path().join("bad_policy.toml");
    std::fs::write(
        &config_file,
        r#"
[compositor]
consistency = "eventually"
"#,
    )
    .unwrap();

    let result = with_config_env(&test_dir, || ConfigLoader::load_from_file(&config_file));
    assert!(result.is_err());
}
