// src/adapter/prusalink.rs
//! PrusaLink 适配器
//!
//! 读取 `/api/printer`（温度、Z 高度）和 `/api/job`（任务进度）。

use super::types::{lenient, seconds, JobStatus, TemperatureBlock};
use super::{base_url, get_json, ProtocolAdapter};
use crate::config::{DeviceConfig, ProtocolKind};
use crate::error::Result;
use crate::model::{clamp_fraction, DeviceState, PrintState, Temperatures, ZHeight};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use tracing::{debug, warn};

/// 任务状态字段等于此值时视为正在打印
const PRINTING_MARKER: &str = "Printing";

/// `/api/printer` 中的 telemetry 块
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    #[serde(rename = "temp-bed", deserialize_with = "lenient::f64")]
    pub temp_bed: Option<f64>,
    #[serde(rename = "temp-nozzle", deserialize_with = "lenient::f64")]
    pub temp_nozzle: Option<f64>,
    #[serde(rename = "z-height", deserialize_with = "lenient::f64")]
    pub z_height: Option<f64>,
}

/// `/api/printer` 响应
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterStatus {
    #[serde(deserialize_with = "lenient::nested")]
    pub telemetry: Option<Telemetry>,
    #[serde(deserialize_with = "lenient::nested")]
    pub temperature: Option<TemperatureBlock>,
}

/// PrusaLink 适配器
pub struct PrusaLinkAdapter {
    client: reqwest::Client,
}

impl PrusaLinkAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 把两个接口的响应合成为统一状态
    pub fn normalize(printer: &PrinterStatus, job: &JobStatus) -> DeviceState {
        let telemetry = printer.telemetry.clone().unwrap_or_default();
        let temperature = printer.temperature.clone().unwrap_or_default();

        let print_state = if job.state.as_deref() == Some(PRINTING_MARKER) {
            PrintState::Printing
        } else {
            PrintState::Idle
        };

        // PrusaLink 的 completion 是 0..1 的比例，不按百分比换算
        let progress = job.completion().unwrap_or(0.0);

        DeviceState {
            print_state,
            temperature: Temperatures {
                bed: telemetry.temp_bed.unwrap_or(0.0),
                nozzle: telemetry.temp_nozzle.unwrap_or(0.0),
            },
            target_temperature: Temperatures {
                bed: temperature.bed_target(),
                nozzle: temperature.nozzle_target(),
            },
            z_height: telemetry
                .z_height
                .map(ZHeight::Millimetres)
                .unwrap_or(ZHeight::Unknown),
            full_job_time: seconds(job.estimated_print_time()),
            already_printed: seconds(job.print_time()),
            still_printing: seconds(job.print_time_left()),
            progress: clamp_fraction(progress),
            job_name: job.job_name(),
            cooldown_deadline: None,
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

        debug!(printer = %device.id, ?printer, ?job, "PrusaLink payloads");
        Ok(Self::normalize(&printer, &job))
    }
}

impl ProtocolAdapter for PrusaLinkAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::PrusaLink
    }

    fn poll<'a>(&'a self, device: &'a DeviceConfig) -> BoxFuture<'a, DeviceState> {
        async move {
            match self.fetch(device).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(printer = %device.id, error = %e, "PrusaLink poll failed");
                    DeviceState::unknown()
                }
            }
        }
        .boxed()
    }
}
