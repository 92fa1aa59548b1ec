//! Camera snapshots with optional lighting
//!
//! A capture switches the printer's light on, waits for the camera to adjust,
//! fetches one JPEG and puts the light back the way it was. Every failure ends
//! in "no picture"; the notification still goes out without one.

mod esp32cam;
mod wled;

pub use esp32cam::Esp32CamLight;
pub use wled::WledLight;

use crate::config::{CameraConfig, LightConfig, LightKind};
use crate::error::{Result, WatchError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A light that can be switched on for a snapshot and restored afterwards
pub trait LightController: Send + Sync {
    fn name(&self) -> &str;

    /// Remember the current light state
    fn save_state(&self) -> BoxFuture<'_, Result<()>>;

    fn set_on(&self, on: bool) -> BoxFuture<'_, Result<()>>;

    /// Put back whatever `save_state` recorded
    fn restore_state(&self) -> BoxFuture<'_, Result<()>>;
}

/// Build the light controller for a config entry
pub fn light_for(config: &LightConfig, client: reqwest::Client) -> Arc<dyn LightController> {
    match config.kind {
        LightKind::Wled => Arc::new(WledLight::new(&config.address, client)),
        LightKind::Esp32Cam => Arc::new(Esp32CamLight::new(&config.address, client)),
    }
}

/// Normalise a bare `host[:port]` into a base URL
pub(crate) fn http_base(address: &str) -> String {
    let trimmed = address.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Per-device snapshot source
pub struct Camera {
    client: reqwest::Client,
    snapshot_url: String,
    light: Option<Arc<dyn LightController>>,
    settle: Duration,
}

impl Camera {
    pub fn new(
        client: reqwest::Client,
        snapshot_url: impl Into<String>,
        light: Option<Arc<dyn LightController>>,
        settle: Duration,
    ) -> Self {
        Self {
            client,
            snapshot_url: snapshot_url.into(),
            light,
            settle,
        }
    }

    pub fn from_config(config: &CameraConfig, client: reqwest::Client) -> Self {
        let light = config.light.as_ref().map(|l| light_for(l, client.clone()));
        Self::new(
            client,
            config.snapshot_url.clone(),
            light,
            Duration::from_millis(config.settle_ms),
        )
    }

    /// Take one picture; `None` on any snapshot failure
    pub async fn capture(&self) -> Option<Vec<u8>> {
        let Some(light) = self.light.as_ref() else {
            return self.fetch_logged().await;
        };

        if let Err(e) = light.save_state().await {
            warn!(light = light.name(), error = %e, "Could not read light state, capturing without light");
            return self.fetch_logged().await;
        }

        match light.set_on(true).await {
            Ok(()) => tokio::time::sleep(self.settle).await,
            Err(e) => warn!(light = light.name(), error = %e, "Could not switch light on"),
        }

        let image = self.fetch_logged().await;

        if let Err(e) = light.restore_state().await {
            warn!(light = light.name(), error = %e, "Could not restore light state");
        }

        image
    }

    async fn fetch_logged(&self) -> Option<Vec<u8>> {
        match self.fetch().await {
            Ok(bytes) => {
                debug!(url = %self.snapshot_url, size = bytes.len(), "Snapshot captured");
                Some(bytes)
            }
            Err(e) => {
                warn!(error = %e, "Snapshot failed");
                None
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.snapshot_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WatchError::transport(&self.snapshot_url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WatchError::transport(&self.snapshot_url, e))?;

        if bytes.is_empty() {
            return Err(WatchError::malformed(&self.snapshot_url, "empty snapshot"));
        }
        Ok(bytes.to_vec())
    }
}
