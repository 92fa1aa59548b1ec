// src/cli/poll.rs
//! Poll / Status 命令 - 查询打印机当前状态，不通知也不发布

use super::bootstrap::{build_devices, load_config};
use super::output::{format_json, format_state_row};
use crate::model::DeviceState;
use crate::notification::MessageFormatter;
use crate::watcher::Device;
use anyhow::{anyhow, Result};
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;

/// Poll 命令参数
#[derive(Args, Debug, Default)]
pub struct PollArgs {
    /// 只查询指定打印机
    #[arg(long, short)]
    pub printer: Option<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// Poll 命令输出
#[derive(Debug, Serialize)]
pub struct PollOutput {
    pub printer: String,
    pub state: DeviceState,
}

/// 并发轮询所选设备
async fn poll_devices(devices: &[Device]) -> Vec<PollOutput> {
    join_all(devices.iter().map(|device| async move {
        PollOutput {
            printer: device.id().to_string(),
            state: device.adapter.poll(&device.config).await,
        }
    }))
    .await
}

/// 处理 poll 命令
pub async fn handle_poll(config: Option<PathBuf>, args: PollArgs) -> Result<()> {
    let (_, config) = load_config(config)?;
    let mut devices = build_devices(&config)?;

    if let Some(id) = args.printer.as_deref() {
        devices.retain(|d| d.id() == id);
        if devices.is_empty() {
            return Err(anyhow!("未找到打印机: {}", id));
        }
    }

    let results = poll_devices(&devices).await;
    if args.json {
        println!("{}", format_json(&results));
    } else {
        for result in &results {
            println!("{}", format_state_row(&result.printer, &result.state));
        }
    }
    Ok(())
}

/// 处理 status 命令：每台打印机一行状态屏文本
pub async fn handle_status(config: Option<PathBuf>, json: bool) -> Result<()> {
    let (_, config) = load_config(config)?;
    let devices = build_devices(&config)?;
    let results = poll_devices(&devices).await;

    let lines: Vec<String> = results
        .iter()
        .map(|r| MessageFormatter::status_line(&r.printer, &r.state))
        .collect();

    if json {
        println!("{}", format_json(&lines));
    } else {
        for (result, line) in results.iter().zip(&lines) {
            if line.is_empty() {
                println!("{}: unreachable", result.printer);
            } else {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
