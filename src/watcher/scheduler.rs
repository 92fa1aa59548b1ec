//! Poll loop - drives every configured printer through one cycle per tick
//!
//! Per device and cycle the steps run strictly in order: poll, classify, decide,
//! (snapshot, render, dispatch), publish, commit. A failure in any step is logged
//! and never stops the other devices.

use super::lifecycle::{LifecycleTracker, TrackedDeviceRecord, TransitionKind};
use super::policy::NotificationPolicy;
use crate::adapter::{get_adapter, http_client, ProtocolAdapter};
use crate::camera::Camera;
use crate::config::{DeviceConfig, GlobalSettings};
use crate::error::Result;
use crate::model::{DeviceState, PrintState};
use crate::notification::{
    MessageFormatter, MessageMetadata, NotificationDispatcher, NotificationMessage, SendResult,
    Urgency,
};
use crate::publisher::{EventSink, PrinterEvent};
use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 一台被监控的打印机
pub struct Device {
    pub config: DeviceConfig,
    pub adapter: Arc<dyn ProtocolAdapter>,
    pub camera: Option<Camera>,
}

impl Device {
    pub fn new(config: DeviceConfig, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        Self {
            config,
            adapter,
            camera: None,
        }
    }

    pub fn with_camera(mut self, camera: Option<Camera>) -> Self {
        self.camera = camera;
        self
    }

    /// 按协议选择适配器，按配置创建摄像头
    pub fn from_config(config: DeviceConfig, timeout: Duration) -> Result<Self> {
        let adapter = get_adapter(config.protocol, timeout)?;
        let camera = match config.camera.as_ref() {
            Some(camera) => Some(Camera::from_config(camera, http_client(timeout)?)),
            None => None,
        };
        Ok(Self::new(config, adapter).with_camera(camera))
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// 单台设备一轮处理的结果
#[derive(Debug, Clone)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub print_state: PrintState,
    pub transition: TransitionKind,
    /// 通知到期且没有任何渠道失败
    pub notified: bool,
    pub delivery: Vec<(String, SendResult)>,
    pub published: bool,
}

/// The per-device processing steps, shared by every device
pub struct Pipeline {
    settings: GlobalSettings,
    tracker: LifecycleTracker,
    formatter: MessageFormatter,
    dispatcher: NotificationDispatcher,
    publisher: Arc<dyn EventSink>,
}

impl Pipeline {
    pub fn new(
        settings: GlobalSettings,
        tracker: LifecycleTracker,
        dispatcher: NotificationDispatcher,
        publisher: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            settings,
            tracker,
            formatter: MessageFormatter::new(),
            dispatcher,
            publisher,
        }
    }

    /// Run one device through one cycle, updating its record in place
    pub async fn process(
        &self,
        device: &Device,
        record: &mut TrackedDeviceRecord,
        now: DateTime<Utc>,
    ) -> DeviceOutcome {
        let id = device.id();
        let polled = device.adapter.poll(&device.config).await;

        if let Some(path) = self.settings.debug_log.as_deref() {
            append_debug_log(path, id, &polled, now);
        }

        let transition = self.tracker.classify(record, polled, now);
        let decision = NotificationPolicy::decide(
            transition.kind,
            record.seconds_since_notification(now),
            device.config.status_interval_secs(),
        );

        debug!(
            printer = %id,
            state = %transition.state.print_state,
            transition = ?transition.kind,
            notify = decision.should_notify,
            forced = decision.forced,
            "Classified poll"
        );

        let mut delivery = Vec::new();
        let mut notified = false;
        if decision.should_notify {
            let image = match device.camera.as_ref() {
                Some(camera) => camera.capture().await,
                None => None,
            };

            let content =
                self.formatter
                    .render(id, &transition.state, transition.kind, &now.with_timezone(&Local));
            let message = NotificationMessage::new(content, Urgency::for_transition(transition.kind))
                .with_device_id(id)
                .with_image(image)
                .with_metadata(MessageMetadata {
                    event_type: transition.kind.label().to_string(),
                    timestamp: Some(now.to_rfc3339()),
                });

            delivery = self.dispatcher.send(&message).await;
            if delivery.iter().any(|(_, result)| result.is_failed()) {
                warn!(printer = %id, "Notification not delivered everywhere, will retry on next eligible poll");
            } else {
                record.mark_notified(now);
                notified = true;
                info!(printer = %id, transition = transition.kind.label(), "Notification sent");
            }
        }

        let event = PrinterEvent {
            device: device.config.clone(),
            state: transition.state.clone(),
            transition: transition.kind,
            timestamp: now,
            status_line: MessageFormatter::status_line(id, &transition.state),
        };
        let published = match self.publisher.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(printer = %id, sink = self.publisher.name(), error = %e, "Publish failed");
                false
            }
        };

        let outcome = DeviceOutcome {
            device_id: id.to_string(),
            print_state: transition.state.print_state,
            transition: transition.kind,
            notified,
            delivery,
            published,
        };
        record.commit(transition.state);
        outcome
    }
}

/// 每轮轮询结果追加一行到调试日志
fn append_debug_log(path: &Path, device_id: &str, state: &DeviceState, now: DateTime<Utc>) {
    let line = match serde_json::to_string(state) {
        Ok(json) => format!("{} {}: {}\n", now.to_rfc3339(), device_id, json),
        Err(e) => {
            warn!(error = %e, "Cannot serialize state for debug log");
            return;
        }
    };

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Cannot append to debug log");
    }
}

/// Fixed-interval scheduler over all configured devices
pub struct Scheduler {
    pipeline: Pipeline,
    devices: Vec<Device>,
    records: HashMap<String, TrackedDeviceRecord>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, devices: Vec<Device>) -> Self {
        let records = devices
            .iter()
            .map(|d| (d.id().to_string(), TrackedDeviceRecord::default()))
            .collect();
        Self {
            pipeline,
            devices,
            records,
        }
    }

    /// 某台设备当前保存的记录
    pub fn record(&self, device_id: &str) -> Option<&TrackedDeviceRecord> {
        self.records.get(device_id)
    }

    /// Poll every device once; outcomes are in device order
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Vec<DeviceOutcome> {
        let pipeline = &self.pipeline;
        let mut records: HashMap<&str, &mut TrackedDeviceRecord> = self
            .records
            .iter_mut()
            .map(|(id, record)| (id.as_str(), record))
            .collect();
        // 每台设备拿到自己那一份记录的独占引用
        let pairs: Vec<(&Device, &mut TrackedDeviceRecord)> = self
            .devices
            .iter()
            .filter_map(|device| records.remove(device.id()).map(|record| (device, record)))
            .collect();

        if pipeline.settings.concurrent_polls {
            join_all(
                pairs
                    .into_iter()
                    .map(|(device, record)| pipeline.process(device, record, now)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(pairs.len());
            for (device, record) in pairs {
                outcomes.push(pipeline.process(device, record, now).await);
            }
            outcomes
        }
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        let period = Duration::from_secs(self.pipeline.settings.interval.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            printers = self.devices.len(),
            interval_secs = period.as_secs(),
            concurrent = self.pipeline.settings.concurrent_polls,
            "Watcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcomes = self.run_cycle(Utc::now()).await;
                    let notified = outcomes.iter().filter(|o| o.notified).count();
                    debug!(printers = outcomes.len(), notified, "Cycle complete");
                }
                result = &mut shutdown => {
                    if let Err(e) = result {
                        warn!(error = %e, "Cannot listen for Ctrl-C, stopping");
                    }
                    info!("Watcher stopped");
                    break;
                }
            }
        }

        Ok(())
    }
}
