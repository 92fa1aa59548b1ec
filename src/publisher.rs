//! Event publisher - one structured event per device per poll cycle
//!
//! Events go to `{prefix}/{device_id}` on the MQTT broker. The optional display
//! topic gets a compact status line for LED matrix feeds. Publishing never blocks
//! the poll loop: messages are queued with `try_publish` and a background task
//! drives the connection.

use crate::config::{DeviceConfig, MqttSettings};
use crate::error::{Result, WatchError};
use crate::model::DeviceState;
use crate::watcher::TransitionKind;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 发布到事件总线的消息
#[derive(Debug, Clone, Serialize)]
pub struct PrinterEvent {
    /// 设备配置（api_key 不会被序列化）
    pub device: DeviceConfig,
    pub state: DeviceState,
    pub transition: TransitionKind,
    pub timestamp: DateTime<Utc>,
    pub status_line: String,
}

/// 状态屏消息 `{type, list: [{text, color}], key}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub list: Vec<DisplayLine>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayLine {
    pub text: String,
    pub color: String,
}

impl DisplayMessage {
    pub fn for_event(event: &PrinterEvent, color: &str) -> Self {
        Self {
            kind: event.device.id.clone(),
            list: vec![DisplayLine {
                text: event.status_line.clone(),
                color: color.to_string(),
            }],
            key: event.device.id.clone(),
        }
    }
}

/// Destination for per-cycle printer events
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    fn publish<'a>(&'a self, event: &'a PrinterEvent) -> BoxFuture<'a, Result<()>>;
}

/// MQTT publisher backed by a single `AsyncClient`
pub struct MqttPublisher {
    client: AsyncClient,
    topic_prefix: String,
    display_topic: Option<String>,
    display_color: String,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop; must run inside a tokio runtime
    pub fn connect(settings: &MqttSettings) -> Self {
        let mut opts = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        opts.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            opts.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(opts, 64);
        let broker = format!("{}:{}", settings.host, settings.port);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %broker, "Connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(broker = %broker, error = %e, "MQTT connection error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic_prefix: settings.topic_prefix.trim_end_matches('/').to_string(),
            display_topic: settings.display_topic.clone(),
            display_color: settings.display_color.clone(),
        }
    }

    pub fn event_topic(&self, device_id: &str) -> String {
        event_topic(&self.topic_prefix, device_id)
    }

    fn enqueue(&self, topic: String, payload: Vec<u8>) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| WatchError::sink("mqtt", e))
    }
}

fn event_topic(prefix: &str, device_id: &str) -> String {
    format!("{}/{}", prefix, device_id)
}

impl EventSink for MqttPublisher {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn publish<'a>(&'a self, event: &'a PrinterEvent) -> BoxFuture<'a, Result<()>> {
        async move {
            let payload = serde_json::to_vec(event).map_err(|e| WatchError::sink("mqtt", e))?;
            let topic = self.event_topic(&event.device.id);
            self.enqueue(topic.clone(), payload)?;
            debug!(topic = %topic, transition = ?event.transition, "Event queued");

            if let Some(display_topic) = &self.display_topic {
                let message = DisplayMessage::for_event(event, &self.display_color);
                let payload =
                    serde_json::to_vec(&message).map_err(|e| WatchError::sink("mqtt", e))?;
                self.enqueue(display_topic.clone(), payload)?;
            }
            Ok(())
        }
        .boxed()
    }
}

/// Fallback sink used when no broker is configured
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn publish<'a>(&'a self, event: &'a PrinterEvent) -> BoxFuture<'a, Result<()>> {
        async move {
            let payload = serde_json::to_string(event).map_err(|e| WatchError::sink("log", e))?;
            debug!(printer = %event.device.id, event = %payload, "Printer event");
            Ok(())
        }
        .boxed()
    }
}
