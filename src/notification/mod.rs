//! 通知抽象层 - 统一管理所有通知渠道
//!
//! 所有渠道实现 `NotificationChannel` trait，`NotificationDispatcher` 负责路由；
//! 单个渠道失败不会影响其他渠道。
//!
//! # 使用示例
//! ```ignore
//! use printwatch::notification::{NotificationBuilder, NotificationMessage, Urgency};
//!
//! let dispatcher = NotificationBuilder::new()
//!     .telegram(config.telegram.clone())
//!     .build()?;
//!
//! let message = NotificationMessage::new("<b>Printjob ended on mk4</b>", Urgency::High);
//! dispatcher.send(&message).await;
//! ```

pub mod builder;
pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod formatter;
pub mod urgency;

pub use builder::NotificationBuilder;
pub use channel::{urgency_meets_threshold, MessageMetadata, NotificationChannel, NotificationMessage, SendResult};
pub use dispatcher::NotificationDispatcher;
pub use formatter::{escape_html, format_duration, MessageFormatter};
pub use urgency::Urgency;
