//! ESP32-CAM flash LED (`/control?var=lamp`, `/status`)

use super::{http_base, LightController};
use crate::error::{Result, WatchError};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Mutex;

pub struct Esp32CamLight {
    base: String,
    client: reqwest::Client,
    saved_lamp: Mutex<Option<i64>>,
}

impl Esp32CamLight {
    pub fn new(address: &str, client: reqwest::Client) -> Self {
        Self {
            base: http_base(address),
            client,
            saved_lamp: Mutex::new(None),
        }
    }

    fn lamp_url(&self, value: i64) -> String {
        format!("{}/control?var=lamp&val={}", self.base, value)
    }

    async fn set_lamp(&self, value: i64) -> Result<()> {
        let url = self.lamp_url(value);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WatchError::transport(&url, e))?;
        Ok(())
    }
}

/// `/status` 里的 `lamp` 字段（0-100）
fn lamp_level(status: &Value) -> Option<i64> {
    status.get("lamp").and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
}

impl LightController for Esp32CamLight {
    fn name(&self) -> &str {
        "esp32cam"
    }

    fn save_state(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let url = format!("{}/status", self.base);
            let status: Value = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| WatchError::transport(&url, e))?
                .json()
                .await
                .map_err(|e| WatchError::malformed(&url, e))?;

            let lamp = lamp_level(&status)
                .ok_or_else(|| WatchError::malformed(&url, "status has no lamp field"))?;
            if let Ok(mut saved) = self.saved_lamp.lock() {
                *saved = Some(lamp);
            }
            Ok(())
        }
        .boxed()
    }

    fn set_on(&self, on: bool) -> BoxFuture<'_, Result<()>> {
        async move { self.set_lamp(if on { 100 } else { 0 }).await }.boxed()
    }

    fn restore_state(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let saved = self.saved_lamp.lock().ok().and_then(|mut s| s.take());
            match saved {
                Some(level) => self.set_lamp(level).await,
                None => Ok(()),
            }
        }
        .boxed()
    }
}
