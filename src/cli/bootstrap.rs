// src/cli/bootstrap.rs
//! 启动装配 - 从配置构建设备、通知渠道、事件发布器和调度器

use crate::config::AppConfig;
use crate::notification::NotificationBuilder;
use crate::publisher::{EventSink, LogSink, MqttPublisher};
use crate::watcher::{CooldownPolicy, Device, LifecycleTracker, Pipeline, Scheduler};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 装配选项
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    /// 只记录，不实际发送通知
    pub dry_run: bool,
    /// 同时输出到控制台
    pub console: bool,
}

/// 定位并加载配置文件
pub fn load_config(explicit: Option<PathBuf>) -> Result<(PathBuf, AppConfig)> {
    let path = AppConfig::resolve_path(explicit);
    let config = AppConfig::load(&path)
        .with_context(|| format!("加载配置失败: {}", path.display()))?;
    Ok((path, config))
}

/// 为每台打印机创建适配器和摄像头
pub fn build_devices(config: &AppConfig) -> Result<Vec<Device>> {
    let timeout = Duration::from_secs(config.settings.poll_timeout_secs);
    config
        .printers
        .iter()
        .map(|printer| {
            Device::from_config(printer.clone(), timeout)
                .with_context(|| format!("初始化打印机 '{}' 失败", printer.id))
        })
        .collect()
}

/// 有 MQTT 配置时连接 broker，否则只写日志
pub fn build_publisher(config: &AppConfig) -> Arc<dyn EventSink> {
    match config.mqtt.as_ref() {
        Some(mqtt) => {
            info!(host = %mqtt.host, port = mqtt.port, prefix = %mqtt.topic_prefix, "Publishing events to MQTT");
            Arc::new(MqttPublisher::connect(mqtt))
        }
        None => {
            info!("MQTT not configured, events are only logged");
            Arc::new(LogSink)
        }
    }
}

/// 构建完整的调度器；需要在 tokio 运行时内调用
pub fn build_scheduler(config: &AppConfig, options: BootstrapOptions) -> Result<Scheduler> {
    let dispatcher = NotificationBuilder::new()
        .telegram(config.telegram.clone())
        .console(options.console)
        .dry_run(options.dry_run)
        .build()?;

    let pipeline = Pipeline::new(
        config.settings.clone(),
        LifecycleTracker::new(CooldownPolicy::from_settings(&config.settings)),
        dispatcher,
        build_publisher(config),
    );

    Ok(Scheduler::new(pipeline, build_devices(config)?))
}
