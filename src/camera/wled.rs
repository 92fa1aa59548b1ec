//! WLED light strip (`/json/state`)

use super::{http_base, LightController};
use crate::error::{Result, WatchError};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::sync::Mutex;

pub struct WledLight {
    state_url: String,
    client: reqwest::Client,
    saved: Mutex<Option<Value>>,
}

impl WledLight {
    pub fn new(address: &str, client: reqwest::Client) -> Self {
        Self {
            state_url: format!("{}/json/state", http_base(address)),
            client,
            saved: Mutex::new(None),
        }
    }

    async fn post_state(&self, body: &Value) -> Result<()> {
        self.client
            .post(&self.state_url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WatchError::transport(&self.state_url, e))?;
        Ok(())
    }
}

impl LightController for WledLight {
    fn name(&self) -> &str {
        "wled"
    }

    fn save_state(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let response = self
                .client
                .get(&self.state_url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| WatchError::transport(&self.state_url, e))?;
            let state: Value = response
                .json()
                .await
                .map_err(|e| WatchError::malformed(&self.state_url, e))?;

            if let Ok(mut saved) = self.saved.lock() {
                *saved = Some(state);
            }
            Ok(())
        }
        .boxed()
    }

    fn set_on(&self, on: bool) -> BoxFuture<'_, Result<()>> {
        async move { self.post_state(&json!({ "on": on })).await }.boxed()
    }

    fn restore_state(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let saved = self.saved.lock().ok().and_then(|mut s| s.take());
            match saved {
                Some(state) => self.post_state(&state).await,
                None => Ok(()),
            }
        }
        .boxed()
    }
}
