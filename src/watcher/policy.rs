//! 通知策略 - 判断一次状态变化是否需要通知用户
//!
//! 开始/结束/冷却结束强制通知；打印中和冷却中按设备的状态间隔限流；
//! 空闲从不通知。

use super::lifecycle::TransitionKind;

/// 通知决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyDecision {
    pub should_notify: bool,
    /// 绕过限流
    pub forced: bool,
}

impl NotifyDecision {
    pub const SKIP: Self = Self {
        should_notify: false,
        forced: false,
    };

    pub const FORCED: Self = Self {
        should_notify: true,
        forced: true,
    };

    pub const THROTTLED_PASS: Self = Self {
        should_notify: true,
        forced: false,
    };
}

/// 通知策略
pub struct NotificationPolicy;

impl NotificationPolicy {
    /// 根据变化类型和距上次通知的时间做决策
    pub fn decide(
        kind: TransitionKind,
        seconds_since_last_notification: i64,
        status_interval_secs: u64,
    ) -> NotifyDecision {
        match kind {
            TransitionKind::JobStarted | TransitionKind::JobEnded | TransitionKind::CooldownEnded => {
                NotifyDecision::FORCED
            }
            TransitionKind::SteadyPrinting | TransitionKind::Cooldown => {
                let interval = i64::try_from(status_interval_secs).unwrap_or(i64::MAX);
                if seconds_since_last_notification > interval {
                    NotifyDecision::THROTTLED_PASS
                } else {
                    NotifyDecision::SKIP
                }
            }
            TransitionKind::NoEvent => NotifyDecision::SKIP,
        }
    }
}
