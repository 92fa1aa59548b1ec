//! 错误类型
//!
//! 设备轮询、通知和事件发布各自在本地恢复错误，只有配置错误会终止进程。

use thiserror::Error;

/// printwatch 错误分类
#[derive(Debug, Error)]
pub enum WatchError {
    /// 与设备或下游 sink 通信失败（网络错误、超时、HTTP 状态码）
    #[error("transport error talking to {target}: {message}")]
    Transport { target: String, message: String },

    /// 设备返回的内容无法解析
    #[error("malformed response from {target}: {message}")]
    MalformedResponse { target: String, message: String },

    /// 启动时配置缺失或不一致
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 通知或事件投递失败
    #[error("delivery to {sink} failed: {message}")]
    SinkDelivery { sink: String, message: String },
}

impl WatchError {
    pub fn transport(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn malformed(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn sink(sink: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::SinkDelivery {
            sink: sink.into(),
            message: err.to_string(),
        }
    }

    /// 配置错误是唯一会阻止启动的错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T, E = WatchError> = std::result::Result<T, E>;
