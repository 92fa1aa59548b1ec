// src/cli/run.rs
//! Run 命令 - 启动轮询循环

use super::bootstrap::{build_scheduler, load_config, BootstrapOptions};
use super::output::format_json;
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Run 命令参数
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// 只执行一轮轮询后退出
    #[arg(long)]
    pub once: bool,

    /// 不实际发送通知
    #[arg(long)]
    pub dry_run: bool,

    /// 同时把通知打印到控制台
    #[arg(long)]
    pub console: bool,

    /// --once 时输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 单轮结果（--once）
#[derive(Debug, Serialize)]
struct CycleRow {
    printer: String,
    state: String,
    transition: String,
    notified: bool,
    published: bool,
}

/// 处理 run 命令
pub async fn handle_run(config: Option<PathBuf>, args: RunArgs) -> Result<()> {
    let (_, config) = load_config(config)?;
    let mut scheduler = build_scheduler(
        &config,
        BootstrapOptions {
            dry_run: args.dry_run,
            console: args.console,
        },
    )?;

    if !args.once {
        return Ok(scheduler.run().await?);
    }

    let outcomes = scheduler.run_cycle(Utc::now()).await;
    // 给 MQTT 事件循环留出发送排队消息的时间
    if config.mqtt.is_some() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let rows: Vec<CycleRow> = outcomes
        .iter()
        .map(|o| CycleRow {
            printer: o.device_id.clone(),
            state: o.print_state.to_string(),
            transition: o.transition.label().to_string(),
            notified: o.notified,
            published: o.published,
        })
        .collect();

    if args.json {
        println!("{}", format_json(&rows));
    } else {
        for row in rows {
            println!(
                "{:<12} {:<9} {:<16} notified={} published={}",
                row.printer, row.state, row.transition, row.notified, row.published
            );
        }
    }
    Ok(())
}
