// src/adapter/octoprint.rs
//! OctoPrint 适配器
//!
//! OctoPrint 没有直接的任务总时长，用已打印 + 剩余时间估算。Z 高度需要
//! DisplayLayerProgress 插件，按精度逐级降级。

use super::types::{lenient, seconds, JobStatus, TemperatureBlock};
use super::{base_url, get_json, ProtocolAdapter};
use crate::config::{DeviceConfig, ProtocolKind};
use crate::error::Result;
use crate::model::{percent_to_fraction, DeviceState, PrintState, Temperatures, ZHeight};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use tracing::{debug, warn};

/// DisplayLayerProgress 插件接口
const LAYER_PROGRESS_PATH: &str = "/plugin/DisplayLayerProgress/values";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateFlags {
    #[serde(deserialize_with = "lenient::bool")]
    pub printing: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterState {
    #[serde(deserialize_with = "lenient::string")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub flags: Option<StateFlags>,
}

/// `/api/printer` 响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterStatus {
    #[serde(deserialize_with = "lenient::nested")]
    pub state: Option<PrinterState>,
    #[serde(deserialize_with = "lenient::nested")]
    pub temperature: Option<TemperatureBlock>,
}

impl PrinterStatus {
    pub fn is_printing(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.flags.as_ref())
            .and_then(|f| f.printing)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressPair {
    #[serde(deserialize_with = "lenient::string")]
    pub current: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub total: Option<String>,
}

/// DisplayLayerProgress 插件响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayerProgress {
    #[serde(deserialize_with = "lenient::nested")]
    pub height: Option<ProgressPair>,
    #[serde(deserialize_with = "lenient::nested")]
    pub layer: Option<ProgressPair>,
}

/// 插件用 "-" 表示尚无数据
fn meaningful(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty() && *s != "-")
}

impl LayerProgress {
    /// 高度 + 层号 → 仅高度 → unknown
    pub fn z_height(&self) -> ZHeight {
        let height = meaningful(self.height.as_ref().and_then(|h| h.current.as_ref()));
        let layer = self.layer.as_ref();
        let current_layer = meaningful(layer.and_then(|l| l.current.as_ref()));
        let total_layers = meaningful(layer.and_then(|l| l.total.as_ref()));

        match (height, current_layer, total_layers) {
            (Some(h), Some(cur), Some(total)) => {
                ZHeight::Described(format!("{}mm (layer {}/{})", h, cur, total))
            }
            (Some(h), _, _) => ZHeight::Described(format!("{}mm", h)),
            _ => ZHeight::Unknown,
        }
    }
}

/// OctoPrint 适配器
pub struct OctoPrintAdapter {
    client: reqwest::Client,
}

impl OctoPrintAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 把 `/api/printer` 与 `/api/job` 合成为统一状态
    pub fn normalize(printer: &PrinterStatus, job: &JobStatus) -> DeviceState {
        let temperature = printer.temperature.clone().unwrap_or_default();
        let print_time = job.print_time();
        let print_time_left = job.print_time_left();

        DeviceState {
            print_state: if printer.is_printing() {
                PrintState::Printing
            } else {
                PrintState::Idle
            },
            temperature: Temperatures {
                bed: temperature.bed_actual(),
                nozzle: temperature.nozzle_actual(),
            },
            target_temperature: Temperatures {
                bed: temperature.bed_target(),
                nozzle: temperature.nozzle_target(),
            },
            z_height: ZHeight::Unknown,
            full_job_time: seconds(print_time) + seconds(print_time_left),
            already_printed: seconds(print_time),
            still_printing: seconds(print_time_left),
            progress: percent_to_fraction(job.completion().unwrap_or(0.0)),
            job_name: job.job_name(),
            cooldown_deadline: None,
        }
    }

    /// 插件失败只影响 Z 高度
    async fn layer_progress(&self, base: &str, device: &DeviceConfig) -> ZHeight {
        let url = format!("{}{}", base, LAYER_PROGRESS_PATH);
        match get_json::<LayerProgress>(&self.client, &url, &device.api_key, &device.id).await {
            Ok(progress) => progress.z_height(),
            Err(e) => {
                debug!(printer = %device.id, error = %e, "Layer progress unavailable");
                ZHeight::Unknown
            }
        }
    }

    async fn fetch(&self, device: &DeviceConfig) -> Result<DeviceState> {
        let base = base_url(device)?;
        let printer_url = format!("{}/api/printer", base);
        let job_url = format!("{}/api/job", base);

        let (printer, job) = tokio::try_join!(
            get_json::<PrinterStatus>(&self.client, &printer_url, &device.api_key, &device.id),
            get_json::<JobStatus>(&self.client, &job_url, &device.api_key, &device.id),
        )?;

        debug!(printer = %device.id, ?printer, ?job, "OctoPrint payloads");

        let mut state = Self::normalize(&printer, &job);
        if device.layer_progress {
            state.z_height = self.layer_progress(&base, device).await;
        }
        Ok(state)
    }
}

impl ProtocolAdapter for OctoPrintAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::OctoPrint
    }

    fn poll<'a>(&'a self, device: &'a DeviceConfig) -> BoxFuture<'a, DeviceState> {
        async move {
            match self.fetch(device).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(printer = %device.id, error = %e, "OctoPrint poll failed");
                    DeviceState::unknown()
                }
            }
        }
        .boxed()
    }
}
