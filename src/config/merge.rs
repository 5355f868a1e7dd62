//! Merge rules: defaults, override order, conflict handling.

use super::{
    default_base_url, default_connect_timeout_secs, default_handle_hide_delay_ms,
    default_poll_interval_ms, default_request_timeout_secs,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.base_url", default_base_url())?
        .set_default("store.connect_timeout_secs", default_connect_timeout_secs())?
        .set_default("store.request_timeout_secs", default_request_timeout_secs())?
        .set_default("compositor.poll_interval_ms", default_poll_interval_ms())?
        .set_default(
            "compositor.handle_hide_delay_ms",
            default_handle_hide_delay_ms(),
        )
}
