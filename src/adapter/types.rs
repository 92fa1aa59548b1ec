// src/adapter/types.rs
//! 厂商 API 的共用报文类型与宽松反序列化
//!
//! 设备固件版本不同，字段可能缺失、为 null、或者把数字写成字符串。这里的
//! 反序列化器对单个字段出错时返回 `None`，而不是让整个报文解析失败。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 宽松字段解析
pub mod lenient {
    use super::*;

    fn number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// 数字或数字字符串；其他形式视为缺失
    pub fn f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(number))
    }

    /// 字符串或数字（转为字符串）；空串视为缺失
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// 布尔值，兼容 "true"/"false" 字符串
    pub fn bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::String(s)) => s.trim().parse::<bool>().ok(),
            _ => None,
        })
    }

    /// 嵌套对象；类型不符时视为缺失
    pub fn nested<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }
}

/// 把可选秒数转换为非负整数秒
pub fn seconds(value: Option<f64>) -> u64 {
    value.map(|v| v.max(0.0).round() as u64).unwrap_or(0)
}

/// 单个加热器的实际/目标温度
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Heater {
    #[serde(deserialize_with = "lenient::f64")]
    pub actual: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    pub target: Option<f64>,
}

/// `temperature` 块，PrusaLink 与 OctoPrint 格式相同
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemperatureBlock {
    #[serde(deserialize_with = "lenient::nested")]
    pub bed: Option<Heater>,
    #[serde(deserialize_with = "lenient::nested")]
    pub tool0: Option<Heater>,
}

impl TemperatureBlock {
    pub fn bed_actual(&self) -> f64 {
        self.bed.as_ref().and_then(|h| h.actual).unwrap_or(0.0)
    }

    pub fn bed_target(&self) -> f64 {
        self.bed.as_ref().and_then(|h| h.target).unwrap_or(0.0)
    }

    pub fn nozzle_actual(&self) -> f64 {
        self.tool0.as_ref().and_then(|h| h.actual).unwrap_or(0.0)
    }

    pub fn nozzle_target(&self) -> f64 {
        self.tool0.as_ref().and_then(|h| h.target).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobFile {
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobInfo {
    #[serde(rename = "estimatedPrintTime", deserialize_with = "lenient::f64")]
    pub estimated_print_time: Option<f64>,
    #[serde(deserialize_with = "lenient::nested")]
    pub file: Option<JobFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobProgress {
    #[serde(deserialize_with = "lenient::f64")]
    pub completion: Option<f64>,
    #[serde(rename = "printTime", deserialize_with = "lenient::f64")]
    pub print_time: Option<f64>,
    #[serde(rename = "printTimeLeft", deserialize_with = "lenient::f64")]
    pub print_time_left: Option<f64>,
}

/// `/api/job` 响应，两种协议共用
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobStatus {
    #[serde(deserialize_with = "lenient::string")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient::nested")]
    pub job: Option<JobInfo>,
    #[serde(deserialize_with = "lenient::nested")]
    pub progress: Option<JobProgress>,
}

impl JobStatus {
    pub fn job_name(&self) -> String {
        self.job
            .as_ref()
            .and_then(|j| j.file.as_ref())
            .and_then(|f| f.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn estimated_print_time(&self) -> Option<f64> {
        self.job.as_ref().and_then(|j| j.estimated_print_time)
    }

    pub fn print_time(&self) -> Option<f64> {
        self.progress.as_ref().and_then(|p| p.print_time)
    }

    pub fn print_time_left(&self) -> Option<f64> {
        self.progress.as_ref().and_then(|p| p.print_time_left)
    }

    pub fn completion(&self) -> Option<f64> {
        self.progress.as_ref().and_then(|p| p.completion)
    }
}
