//! 通知渠道 trait 定义

use super::urgency::Urgency;
use crate::error::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// 通知消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// 消息内容（已格式化，HTML）
    pub content: String,
    /// 打印机 ID
    pub device_id: Option<String>,
    /// 紧急程度
    pub urgency: Urgency,
    /// 摄像头快照（JPEG）
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    /// 消息元数据
    pub metadata: MessageMetadata,
}

impl NotificationMessage {
    /// 创建简单消息
    pub fn new(content: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            content: content.into(),
            device_id: None,
            urgency,
            image: None,
            metadata: MessageMetadata::default(),
        }
    }

    /// 设置 device_id
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// 附带图片
    pub fn with_image(mut self, image: Option<Vec<u8>>) -> Self {
        self.image = image;
        self
    }

    /// 设置元数据
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 消息元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// 状态变化类型
    pub event_type: String,
    /// 时间戳（RFC 3339）
    pub timestamp: Option<String>,
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（不符合渠道过滤条件）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

impl SendResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, SendResult::Failed(_))
    }
}

/// 通知渠道 trait
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于日志和配置）
    fn name(&self) -> &str;

    /// 是否应该发送此消息（根据 urgency 等条件过滤）
    fn should_send(&self, message: &NotificationMessage) -> bool;

    /// 发送消息
    fn send<'a>(&'a self, message: &'a NotificationMessage) -> BoxFuture<'a, Result<SendResult>>;
}

/// 检查 urgency 是否满足最低要求
pub fn urgency_meets_threshold(message_urgency: Urgency, min_urgency: Urgency) -> bool {
    match (message_urgency, min_urgency) {
        (Urgency::High, _) => true,
        (Urgency::Medium, Urgency::High) => false,
        (Urgency::Medium, _) => true,
        (Urgency::Low, Urgency::Low) => true,
        (Urgency::Low, _) => false,
    }
}
