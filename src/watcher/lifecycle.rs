//! Print job lifecycle tracking - classifies the change between two polls

use crate::config::GlobalSettings;
use crate::model::{DeviceState, PrintState};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// 两次轮询之间的状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// 上次在打印，这次仍在打印
    SteadyPrinting,
    /// 开始打印
    JobStarted,
    /// 打印结束，进入冷却
    JobEnded,
    /// 冷却中
    Cooldown,
    /// 冷却结束
    CooldownEnded,
    /// 空闲，无变化
    NoEvent,
}

impl TransitionKind {
    /// 通知标题里的描述
    pub fn label(&self) -> &'static str {
        match self {
            TransitionKind::SteadyPrinting => "in progress",
            TransitionKind::JobStarted => "started",
            TransitionKind::JobEnded => "ended",
            TransitionKind::Cooldown => "cooling down",
            TransitionKind::CooldownEnded => "final cool down",
            TransitionKind::NoEvent => "idle",
        }
    }
}

/// 冷却参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownPolicy {
    pub duration: Duration,
    /// 热床低于此温度（°C）时冷却结束
    pub temperature_threshold: f64,
}

impl CooldownPolicy {
    pub fn new(duration_secs: u64, temperature_threshold: f64) -> Self {
        Self {
            duration: Duration::seconds(duration_secs.min(i64::MAX as u64 / 1000) as i64),
            temperature_threshold,
        }
    }

    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self::new(settings.cooldown_secs, settings.cooldown_temperature)
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from_settings(&GlobalSettings::default())
    }
}

/// 单台设备跨轮询保留的记录
#[derive(Debug, Clone)]
pub struct TrackedDeviceRecord {
    pub last_state: DeviceState,
    pub last_notified_at: DateTime<Utc>,
}

impl Default for TrackedDeviceRecord {
    fn default() -> Self {
        Self {
            last_state: DeviceState::default(),
            // 足够久远，第一次事件不会被限流
            last_notified_at: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl TrackedDeviceRecord {
    /// 距离上次通知的秒数
    pub fn seconds_since_notification(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.last_notified_at).num_seconds()
    }

    /// 记录通知时间（单调不减）
    pub fn mark_notified(&mut self, now: DateTime<Utc>) {
        if now > self.last_notified_at {
            self.last_notified_at = now;
        }
    }

    /// 提交本轮的结果状态
    pub fn commit(&mut self, state: DeviceState) {
        self.last_state = state;
    }
}

/// 分类结果：变化类型 + 应当保存的新状态（含冷却截止时间）
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub state: DeviceState,
}

/// Classifies transitions; pure given the record, the poll result and `now`
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleTracker {
    cooldown: CooldownPolicy,
}

impl LifecycleTracker {
    pub fn new(cooldown: CooldownPolicy) -> Self {
        Self { cooldown }
    }

    /// Classify `polled` against the previous record
    pub fn classify(
        &self,
        record: &TrackedDeviceRecord,
        polled: DeviceState,
        now: DateTime<Utc>,
    ) -> Transition {
        let was_printing = record.last_state.print_state.is_printing();
        let pending_deadline = record.last_state.cooldown_deadline;

        let mut state = polled;
        state.cooldown_deadline = None;

        let kind = match (was_printing, state.print_state) {
            (true, PrintState::Printing) => TransitionKind::SteadyPrinting,
            (false, PrintState::Printing) => TransitionKind::JobStarted,
            (true, _) => {
                state.cooldown_deadline = Some(
                    now.checked_add_signed(self.cooldown.duration)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                );
                TransitionKind::JobEnded
            }
            // An unknown poll has no real bed temperature; only carry the deadline
            (false, PrintState::Unknown) => {
                state.cooldown_deadline = pending_deadline;
                TransitionKind::NoEvent
            }
            (false, PrintState::Idle) => match pending_deadline {
                Some(deadline)
                    if now >= deadline
                        || state.temperature.bed < self.cooldown.temperature_threshold =>
                {
                    TransitionKind::CooldownEnded
                }
                Some(deadline) => {
                    state.cooldown_deadline = Some(deadline);
                    TransitionKind::Cooldown
                }
                None => TransitionKind::NoEvent,
            },
        };

        Transition { kind, state }
    }
}
