//! Loader entry points.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::LayoverConfig;
use crate::error::OverlayError;
use config::{File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `LayoverConfig` from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<LayoverConfig, OverlayError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder);
        let builder = workspace_file::add_to_builder(builder, workspace_root);
        let builder = environment::add_to_builder(builder);

        let config: LayoverConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// A single explicit file over the defaults, then environment. The file
    /// must exist.
    pub fn load_from_file(path: &Path) -> Result<LayoverConfig, OverlayError> {
        let builder = builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(true));
        let builder = environment::add_to_builder(builder);

        let config: LayoverConfig = builder.build()?.try_deserialize()?;
        debug!(config_path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
