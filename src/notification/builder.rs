//! 通知系统构建器 - 根据配置注册渠道

use super::channels::console::ConsoleChannel;
use super::channels::telegram::{TelegramChannel, TelegramConfig};
use super::dispatcher::NotificationDispatcher;
use super::urgency::Urgency;
use crate::config::TelegramSettings;
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// 通知系统构建器
pub struct NotificationBuilder {
    telegram: Option<TelegramSettings>,
    console: bool,
    dry_run: bool,
}

impl NotificationBuilder {
    pub fn new() -> Self {
        Self {
            telegram: None,
            console: false,
            dry_run: false,
        }
    }

    /// 配置 Telegram
    pub fn telegram(mut self, settings: Option<TelegramSettings>) -> Self {
        self.telegram = settings;
        self
    }

    /// 是否启用控制台渠道
    pub fn console(mut self, enable: bool) -> Self {
        self.console = enable;
        self
    }

    /// 设置 dry-run 模式
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 构建 NotificationDispatcher
    ///
    /// Telegram 缺少 token 或 chat_id 时跳过（不算配置错误）；一个渠道都没有时
    /// 回退到控制台。
    pub fn build(self) -> Result<NotificationDispatcher> {
        let mut dispatcher = NotificationDispatcher::new().with_dry_run(self.dry_run);

        match self.telegram.as_ref() {
            Some(settings) => match TelegramConfig::from_settings(settings) {
                Some(config) => {
                    info!(channel = "telegram", chat_id = %config.chat_id, "Detected Telegram channel");
                    dispatcher.register_channel(Arc::new(TelegramChannel::new(config)?));
                }
                None => warn!("Telegram section present but token or chat_id is missing"),
            },
            None => info!("Telegram not configured"),
        }

        if self.console || dispatcher.channel_count() == 0 {
            dispatcher.register_channel(Arc::new(ConsoleChannel::new(Urgency::Low)));
        }

        Ok(dispatcher)
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
