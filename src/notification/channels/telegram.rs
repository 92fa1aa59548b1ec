//! Telegram 渠道 - 通过 Bot API 直接发送
//!
//! 无图片时调用 `sendMessage`；有图片时调用 `sendPhoto`，正文放进 caption。
//! caption 超过 Telegram 的长度上限时，先发图片再单独发正文。

use crate::config::TelegramSettings;
use crate::error::{Result, WatchError};
use crate::notification::channel::{
    urgency_meets_threshold, NotificationChannel, NotificationMessage, SendResult,
};
use crate::notification::urgency::Urgency;
use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Telegram caption 最大字符数
pub const CAPTION_LIMIT: usize = 1024;

/// Telegram 渠道配置
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    /// Bot API 地址
    pub api_base: String,
    /// 最低发送 urgency
    pub min_urgency: Urgency,
    pub timeout: Duration,
}

impl TelegramConfig {
    /// 从配置文件构建；token 或 chat_id 缺失时返回 None
    pub fn from_settings(settings: &TelegramSettings) -> Option<Self> {
        let token = settings.token.clone().filter(|t| !t.is_empty())?;
        let chat_id = settings.chat_id.clone().filter(|c| !c.is_empty())?;
        Some(Self {
            token,
            chat_id,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            min_urgency: settings.min_urgency,
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        })
    }
}

/// Bot API 的统一响应外壳
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram 渠道
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WatchError::Configuration(format!("telegram client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.token, method)
    }

    async fn send_text(&self, text: &str) -> Result<SendResult> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&body)
            .send()
            .await
            // 错误信息里的 URL 带 token，不能原样输出
            .map_err(|e| WatchError::sink("telegram", e.without_url()))?;

        self.interpret("sendMessage", response).await
    }

    async fn send_photo(&self, image: &[u8], caption: Option<&str>) -> Result<SendResult> {
        let photo = Part::bytes(image.to_vec())
            .file_name("snapshot.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| WatchError::sink("telegram", e.without_url()))?;

        let mut form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .part("photo", photo);
        if let Some(caption) = caption {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", "HTML");
        }

        let response = self
            .client
            .post(self.endpoint("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WatchError::sink("telegram", e.without_url()))?;

        self.interpret("sendPhoto", response).await
    }

    async fn interpret(&self, method: &str, response: reqwest::Response) -> Result<SendResult> {
        let status = response.status();
        let parsed = response.json::<ApiResponse>().await.ok();

        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => {
                info!(chat_id = %self.config.chat_id, method, "Telegram message sent");
                Ok(SendResult::Sent)
            }
            other => {
                let reason = other
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                error!(method, status = %status, error = %reason, "Telegram API rejected message");
                Ok(SendResult::Failed(reason))
            }
        }
    }
}

impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn should_send(&self, message: &NotificationMessage) -> bool {
        urgency_meets_threshold(message.urgency, self.config.min_urgency)
    }

    fn send<'a>(&'a self, message: &'a NotificationMessage) -> BoxFuture<'a, Result<SendResult>> {
        async move {
            let Some(image) = message.image.as_deref() else {
                return self.send_text(&message.content).await;
            };

            if message.content.chars().count() <= CAPTION_LIMIT {
                return self.send_photo(image, Some(&message.content)).await;
            }

            let photo = self.send_photo(image, None).await?;
            if photo.is_failed() {
                return Ok(photo);
            }
            self.send_text(&message.content).await
        }
        .boxed()
    }
}
