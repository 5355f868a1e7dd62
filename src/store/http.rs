//! HTTP/JSON overlay store client.

use super::wire::{created_overlay, decode_listing, CreateRequest, ErrorBody};
use super::OverlayStore;
use crate::config::StoreConfig;
use crate::error::{OverlayError, StoreError};
use crate::overlay::{NewOverlay, Overlay, OverlayId, OverlayPatch, StreamId};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::{debug, warn};

// Helper function to map transport errors to StoreError
fn map_http_error(error: reqwest::Error) -> StoreError {
    if let Some(status) = error.status() {
        StoreError::rejected(status.as_u16(), error.to_string())
    } else if error.is_timeout() {
        StoreError::network(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        StoreError::network(format!("Connection error: {}", error))
    } else {
        StoreError::network(format!("HTTP error: {}", error))
    }
}

fn build_store_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, OverlayError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| OverlayError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into `RemoteRejected`, preferring the store's own
/// `error` message.
async fn rejection(response: Response) -> StoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .ok()
        .filter(|m| !m.is_empty())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
    StoreError::rejected(status.as_u16(), message)
}

/// Overlay store reached over HTTP.
pub struct HttpOverlayStore {
    client: Client,
    base_url: Url,
}

impl HttpOverlayStore {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| OverlayError::Config(format!("Invalid store URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(OverlayError::Config(format!(
                "Store URL '{}' cannot be used as a base",
                base_url
            )));
        }
        let client = build_store_http_client(connect_timeout, request_timeout)?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, OverlayError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/overlays/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("overlays").extend(segments);
        }
        url
    }
}

#[async_trait]
impl OverlayStore for HttpOverlayStore {
    async fn list(&self, stream_id: &StreamId) -> Result<Vec<Overlay>, StoreError> {
        let url = self.endpoint(&[stream_id.as_str()]);
        debug!(%url, "Listing overlays");
        let response = self.client.get(url).send().await.map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            let err = rejection(response).await;
            warn!(stream_id = %stream_id, error = %err, "List overlays rejected");
            return Err(err);
        }

        let rows: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            StoreError::rejected(status.as_u16(), format!("Failed to parse response: {}", e))
        })?;

        Ok(decode_listing(rows, stream_id))
    }

    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, StoreError> {
        let url = self.endpoint(&[]);
        debug!(%url, stream_id = %overlay.stream_id, kind = %overlay.kind, "Creating overlay");
        let response = self
            .client
            .post(url)
            .json(&CreateRequest::from(overlay))
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            StoreError::rejected(status.as_u16(), format!("Failed to parse response: {}", e))
        })?;
        created_overlay(body, overlay).map_err(|e| {
            StoreError::rejected(
                status.as_u16(),
                format!("Create response carried no overlay id: {}", e),
            )
        })
    }

    async fn update(&self, id: &OverlayId, patch: &OverlayPatch) -> Result<(), StoreError> {
        let url = self.endpoint(&[id.as_str()]);
        debug!(%url, "Updating overlay");
        let response = self
            .client
            .put(url)
            .json(patch)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    async fn delete(&self, id: &OverlayId) -> Result<(), StoreError> {
        let url = self.endpoint(&[id.as_str()]);
        debug!(%url, "Deleting overlay");
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}
