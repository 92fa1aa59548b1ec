//! 控制台渠道 - 把通知打印到标准输出（去掉 HTML 标签）

use crate::error::Result;
use crate::notification::channel::{
    urgency_meets_threshold, NotificationChannel, NotificationMessage, SendResult,
};
use crate::notification::urgency::Urgency;
use futures::future::{BoxFuture, FutureExt};

/// 控制台渠道
pub struct ConsoleChannel {
    min_urgency: Urgency,
}

impl ConsoleChannel {
    pub fn new(min_urgency: Urgency) -> Self {
        Self { min_urgency }
    }

    /// 纯文本形式，供终端显示
    pub fn render(message: &NotificationMessage) -> String {
        let mut text = strip_tags(&message.content)
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&");
        if message.image.is_some() {
            text.push_str("\n[snapshot attached]");
        }
        text
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new(Urgency::Low)
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn should_send(&self, message: &NotificationMessage) -> bool {
        urgency_meets_threshold(message.urgency, self.min_urgency)
    }

    fn send<'a>(&'a self, message: &'a NotificationMessage) -> BoxFuture<'a, Result<SendResult>> {
        async move {
            println!("[{}] {}", message.urgency, Self::render(message));
            Ok(SendResult::Sent)
        }
        .boxed()
    }
}
