// src/adapter/mod.rs
//! 打印机协议适配器
//!
//! 每种固件协议一个适配器，统一输出 [`DeviceState`]。适配器在加载配置时按
//! [`ProtocolKind`] 选定，之后不再变化。

mod types;

pub use types::*;

pub mod octoprint;
pub mod prusalink;

use crate::config::{DeviceConfig, ProtocolKind};
use crate::error::{Result, WatchError};
use crate::model::DeviceState;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 打印机协议适配器 trait
///
/// `poll` 永远不会失败：任何网络或解析错误都转换为 `PrintState::Unknown`。
pub trait ProtocolAdapter: Send + Sync {
    /// 协议类型
    fn kind(&self) -> ProtocolKind;

    /// 轮询一次设备
    fn poll<'a>(&'a self, device: &'a DeviceConfig) -> BoxFuture<'a, DeviceState>;
}

/// 根据协议类型创建适配器
pub fn get_adapter(kind: ProtocolKind, timeout: Duration) -> Result<Arc<dyn ProtocolAdapter>> {
    let client = http_client(timeout)?;
    Ok(match kind {
        ProtocolKind::PrusaLink => Arc::new(prusalink::PrusaLinkAdapter::new(client)),
        ProtocolKind::OctoPrint => Arc::new(octoprint::OctoPrintAdapter::new(client)),
    })
}

/// 带超时的 HTTP 客户端
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| WatchError::Configuration(format!("cannot create HTTP client: {}", e)))
}

/// GET 一个 JSON 接口（带 X-Api-Key）
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    target: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .header("X-Api-Key", api_key)
        .send()
        .await
        .map_err(|e| WatchError::transport(target, e))?
        .error_for_status()
        .map_err(|e| WatchError::transport(target, e))?;

    let body = response
        .text()
        .await
        .map_err(|e| WatchError::transport(target, e))?;

    debug!(printer = %target, url = %url, body_len = body.len(), "Fetched device payload");

    serde_json::from_str(&body).map_err(|e| WatchError::malformed(target, e))
}

/// 设备的基础 URL；配置校验保证存在
pub(crate) fn base_url(device: &DeviceConfig) -> Result<String> {
    device.base_url().ok_or_else(|| {
        WatchError::Configuration(format!(
            "printer '{}' has no address for {}",
            device.id, device.protocol
        ))
    })
}
