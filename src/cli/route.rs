//! CLI route: single route table and run context. Dispatches to the store, the
//! cache and the compositor, then to presentation.

use crate::cache::OverlayCache;
use crate::cli::parse::{Commands, ListFormat};
use crate::cli::presentation::{format_overlay_table, format_render_list};
use crate::compositor::{Compositor, CompositorOptions, Surface};
use crate::config::{ConfigLoader, LayoverConfig};
use crate::error::{OverlayError, ValidationError};
use crate::overlay::{NewOverlay, OverlayId, OverlayPatch, Position, Size, StreamId};
use crate::store::{HttpOverlayStore, OverlayStore};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often `watch` re-renders to look for changes.
const WATCH_REFRESH: Duration = Duration::from_millis(250);

/// Runtime context for CLI execution: effective configuration and the store.
pub struct RunContext {
    config: LayoverConfig,
    store: Arc<dyn OverlayStore>,
}

impl RunContext {
    /// Load and validate configuration, then connect the HTTP store.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        base_url: Option<String>,
    ) -> Result<Self, OverlayError> {
        let mut config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        if let Some(base_url) = base_url {
            config.store.base_url = base_url;
        }

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            OverlayError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        let store = Arc::new(HttpOverlayStore::from_config(&config.store)?);
        debug!(store = %store.describe(), "Overlay store configured");
        Ok(Self { config, store })
    }

    /// Run against an already-built store.
    pub fn with_store(config: LayoverConfig, store: Arc<dyn OverlayStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &LayoverConfig {
        &self.config
    }

    fn cache(&self) -> Arc<OverlayCache> {
        OverlayCache::shared(self.store.clone(), self.config.compositor.consistency)
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, OverlayError> {
        match command {
            Commands::List { stream, format } => {
                self.list(StreamId::from(stream.as_str()), *format).await
            }
            Commands::AddText {
                stream,
                text,
                x,
                y,
                width,
                height,
            } => {
                let request = NewOverlay::text(stream.as_str(), text.as_str());
                let request = place(request, *x, *y, *width, *height);
                self.add(request).await
            }
            Commands::AddImage {
                stream,
                url,
                x,
                y,
                width,
                height,
            } => {
                let request = NewOverlay::image(stream.as_str(), url.as_str());
                let request = place(request, *x, *y, *width, *height);
                self.add(request).await
            }
            Commands::Move { id, x, y } => {
                self.patch(OverlayId::from(id.as_str()), OverlayPatch::position(*x, *y))
                    .await
            }
            Commands::Resize {
                id,
                width,
                height,
                x,
                y,
            } => {
                let size = Size::new(*width, *height)?;
                let patch = match (x, y) {
                    (Some(x), Some(y)) => OverlayPatch::geometry(Position::new(*x, *y), size),
                    _ => OverlayPatch {
                        size: Some(size),
                        ..OverlayPatch::default()
                    },
                };
                self.patch(OverlayId::from(id.as_str()), patch).await
            }
            Commands::Edit { id, content } => {
                let content = content.trim();
                if content.is_empty() {
                    return Err(ValidationError::EmptyContent.into());
                }
                self.patch(OverlayId::from(id.as_str()), OverlayPatch::content(content))
                    .await
            }
            Commands::Delete { id } => {
                let id = OverlayId::from(id.as_str());
                self.store.delete(&id).await?;
                Ok(format!("Deleted overlay {}", id))
            }
            Commands::Watch {
                stream,
                width,
                height,
            } => {
                self.watch(StreamId::from(stream.as_str()), Surface::new(*width, *height))
                    .await
            }
            Commands::Config => toml::to_string_pretty(&self.config).map_err(|e| {
                OverlayError::Config(format!("Failed to render configuration: {}", e))
            }),
        }
    }

    async fn list(&self, stream: StreamId, format: ListFormat) -> Result<String, OverlayError> {
        let cache = self.cache();
        cache.load(&stream).await?;
        let overlays = cache.snapshot();
        match format {
            ListFormat::Table => Ok(format_overlay_table(&overlays)),
            ListFormat::Json => serde_json::to_string_pretty(&overlays)
                .map_err(|e| OverlayError::Config(format!("Failed to render overlays: {}", e))),
        }
    }

    async fn add(&self, request: NewOverlay) -> Result<String, OverlayError> {
        let created = self.cache().add(request).await?;
        info!(overlay_id = %created.id, stream_id = %created.stream_id, "Overlay created");
        Ok(format!("Created {} overlay {}", created.kind, created.id))
    }

    async fn patch(&self, id: OverlayId, patch: OverlayPatch) -> Result<String, OverlayError> {
        patch.validate()?;
        self.store.update(&id, &patch).await?;
        Ok(format!("Updated overlay {}", id))
    }

    /// Mount a compositor and print the draw list whenever it changes, until
    /// Ctrl-C.
    async fn watch(&self, stream: StreamId, surface: Surface) -> Result<String, OverlayError> {
        let cache = self.cache();
        let mut compositor = Compositor::mount(
            cache.clone(),
            stream.clone(),
            surface,
            CompositorOptions::from(&self.config.compositor),
        )
        .await;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ticker = tokio::time::interval(WATCH_REFRESH);
        let mut last_view: Option<String> = None;

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = ticker.tick() => {
                    // An empty stream shows Loading on every reload; keep the last view.
                    if cache.is_loading() && last_view.is_some() {
                        continue;
                    }
                    let view = if cache.is_loading() {
                        "Loading...".to_string()
                    } else {
                        let mut view = format_render_list(&compositor.render(Instant::now()));
                        if let Some(error) = cache.status().error() {
                            view.push_str(&format!("\n! {}", error));
                        }
                        view
                    };
                    if last_view.as_deref() != Some(view.as_str()) {
                        println!("[{}] {}\n{}", Utc::now().to_rfc3339(), stream, view);
                        last_view = Some(view);
                    }
                }
            }
        }

        compositor.unmount().await;
        Ok(format!("Stopped watching {}", stream))
    }
}

fn place(
    mut request: NewOverlay,
    x: Option<i32>,
    y: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
) -> NewOverlay {
    request.position = Position::new(
        x.unwrap_or(request.position.x),
        y.unwrap_or(request.position.y),
    );
    request.size = Size {
        width: width.unwrap_or(request.size.width),
        height: height.unwrap_or(request.size.height),
    };
    request
}
