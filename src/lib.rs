//! printwatch - 3D 打印机监控
//!
//! 周期性轮询 PrusaLink / OctoPrint 打印机，跟踪每台设备的任务生命周期，
//! 按策略推送 Telegram 通知，并把每轮状态发布到 MQTT。

pub mod adapter;
pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod notification;
pub mod publisher;
pub mod watcher;

pub use adapter::{get_adapter, ProtocolAdapter};
pub use config::{AppConfig, DeviceConfig, GlobalSettings, ProtocolKind};
pub use error::{Result, WatchError};
pub use model::{DeviceState, PrintState, Temperatures, ZHeight};
pub use notification::{
    MessageFormatter, NotificationChannel, NotificationDispatcher, NotificationMessage, SendResult,
    Urgency,
};
pub use publisher::{EventSink, LogSink, MqttPublisher, PrinterEvent};
pub use watcher::{
    CooldownPolicy, Device, DeviceOutcome, LifecycleTracker, NotificationPolicy, Pipeline,
    Scheduler, TrackedDeviceRecord, TransitionKind,
};
