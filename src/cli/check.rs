// src/cli/check.rs
//! Check-config 命令 - 校验配置文件并打印摘要

use super::bootstrap::load_config;
use crate::notification::channels::TelegramConfig;
use anyhow::Result;
use std::path::PathBuf;

/// 处理 check-config 命令；校验失败时返回错误
pub fn handle_check_config(config: Option<PathBuf>) -> Result<()> {
    let (path, config) = load_config(config)?;

    println!("配置有效: {}", path.display());
    println!(
        "  轮询间隔: {}s  冷却: {}s / {}°C  超时: {}s  并发: {}",
        config.settings.interval,
        config.settings.cooldown_secs,
        config.settings.cooldown_temperature,
        config.settings.poll_timeout_secs,
        config.settings.concurrent_polls,
    );
    for printer in &config.printers {
        println!(
            "  - {} ({}) {} 状态间隔 {}s{}",
            printer.id,
            printer.protocol,
            printer.base_url().unwrap_or_default(),
            printer.status_interval_secs(),
            if printer.camera.is_some() { " [camera]" } else { "" },
        );
    }
    let telegram = match config.telegram.as_ref() {
        Some(settings) if TelegramConfig::from_settings(settings).is_some() => "已配置",
        Some(_) => "缺少 token 或 chat_id（使用控制台）",
        None => "未配置（使用控制台）",
    };
    println!("  Telegram: {}", telegram);
    match &config.mqtt {
        Some(mqtt) => println!("  MQTT: {}:{} -> {}/<printer>", mqtt.host, mqtt.port, mqtt.topic_prefix),
        None => println!("  MQTT: 未配置"),
    }
    Ok(())
}
