//! 统一的打印机状态模型
//!
//! 所有适配器都把各自厂商的遥测数据转换成 [`DeviceState`]。缺失的数值字段一律为 0，
//! 缺失的文本字段为 "Unknown"/"unknown"，调用方永远不需要处理字段缺失。

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// 打印状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintState {
    Printing,
    #[default]
    Idle,
    /// 本轮轮询失败，状态未知
    Unknown,
}

impl PrintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintState::Printing => "printing",
            PrintState::Idle => "idle",
            PrintState::Unknown => "unknown",
        }
    }

    pub fn is_printing(&self) -> bool {
        matches!(self, PrintState::Printing)
    }
}

impl fmt::Display for PrintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 热床/喷嘴温度（°C）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Temperatures {
    pub bed: f64,
    pub nozzle: f64,
}

/// Z 轴高度
///
/// PrusaLink 直接给出数值；OctoPrint 的分层插件给出带层号的描述。
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ZHeight {
    Millimetres(f64),
    Described(String),
    #[default]
    Unknown,
}

impl fmt::Display for ZHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZHeight::Millimetres(mm) => write!(f, "{}", mm),
            ZHeight::Described(text) => f.write_str(text),
            ZHeight::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for ZHeight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ZHeight::Millimetres(mm) => serializer.serialize_f64(*mm),
            ZHeight::Described(text) => serializer.serialize_str(text),
            ZHeight::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// 单次轮询得到的设备状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub print_state: PrintState,
    pub temperature: Temperatures,
    pub target_temperature: Temperatures,
    pub z_height: ZHeight,
    /// 整个任务的预计时长（秒）
    pub full_job_time: u64,
    /// 已打印时长（秒）
    pub already_printed: u64,
    /// 剩余时长（秒）
    pub still_printing: u64,
    /// 进度 0.0 ..= 1.0
    pub progress: f64,
    pub job_name: String,
    /// 冷却截止时间，仅在任务结束后的冷却期内存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_deadline: Option<DateTime<Utc>>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            print_state: PrintState::Idle,
            temperature: Temperatures::default(),
            target_temperature: Temperatures::default(),
            z_height: ZHeight::Unknown,
            full_job_time: 0,
            already_printed: 0,
            still_printing: 0,
            progress: 0.0,
            job_name: "Unknown".to_string(),
            cooldown_deadline: None,
        }
    }
}

impl DeviceState {
    /// 轮询失败时的状态：除 print_state 外全部为默认值
    pub fn unknown() -> Self {
        Self {
            print_state: PrintState::Unknown,
            ..Self::default()
        }
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown_deadline.is_some()
    }
}

/// 把任意浮点数限制到 [0, 1]，NaN 视为 0
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 把 0-100 的百分比转换为 [0, 1] 的比例
pub fn percent_to_fraction(percent: f64) -> f64 {
    clamp_fraction(percent / 100.0)
}
