//! 配置加载
//!
//! 启动时从 YAML 文件读取一次，进程生命周期内不再变化。查找顺序：
//! 1. 命令行 `--config`
//! 2. 环境变量 `PRINTWATCH_CONFIG` / `INPUTFILE`
//! 3. 当前目录下的 `printwatch.yaml`
//! 4. `~/.config/printwatch/config.yaml`

use crate::error::{Result, WatchError};
use crate::notification::Urgency;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "printwatch.yaml";

/// 设备协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[serde(alias = "prusa", alias = "prusa_link")]
    PrusaLink,
    #[serde(alias = "octo", alias = "octopi")]
    OctoPrint,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::PrusaLink => write!(f, "prusalink"),
            ProtocolKind::OctoPrint => write!(f, "octoprint"),
        }
    }
}

/// 全局设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// 轮询间隔（秒）
    #[serde(alias = "poll_interval")]
    pub interval: u64,
    /// 任务结束后的冷却时长（秒）
    #[serde(alias = "cooldown")]
    pub cooldown_secs: u64,
    /// 热床低于此温度（°C）即结束冷却
    #[serde(alias = "cooldowntemperature")]
    pub cooldown_temperature: f64,
    /// 单次 HTTP 请求超时（秒）
    pub poll_timeout_secs: u64,
    /// 是否并发轮询所有设备
    pub concurrent_polls: bool,
    /// 设备未单独配置时的状态通知间隔（秒）
    #[serde(alias = "statusinterval")]
    pub status_interval: u64,
    /// 每次轮询结果追加写入的调试日志
    pub debug_log: Option<PathBuf>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            interval: 60,
            cooldown_secs: 600,
            cooldown_temperature: 35.0,
            poll_timeout_secs: 30,
            concurrent_polls: false,
            status_interval: 900,
            debug_log: None,
        }
    }
}

/// 补光灯类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    Wled,
    #[serde(alias = "esp32-cam", alias = "esp32_cam")]
    Esp32Cam,
}

/// 补光灯配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(rename = "type")]
    pub kind: LightKind,
    pub address: String,
}

/// 摄像头配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(alias = "snapshot")]
    pub snapshot_url: String,
    #[serde(default, alias = "lights")]
    pub light: Option<LightConfig>,
    /// 开灯后等待曝光稳定的时间（毫秒）
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    1500
}

/// 单台打印机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(alias = "printer", alias = "name")]
    pub id: String,
    #[serde(alias = "api")]
    pub protocol: ProtocolKind,
    /// PrusaLink 主机名或 IP
    #[serde(default)]
    pub host: Option<String>,
    /// OctoPrint 基础 URL
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// 从不写入发布的事件
    #[serde(alias = "key", default, skip_serializing)]
    pub api_key: String,
    /// 状态通知间隔（秒），缺省时取全局设置
    #[serde(default, alias = "statusinterval")]
    pub status_interval: Option<u64>,
    /// OctoPrint DisplayLayerProgress 插件
    #[serde(default, alias = "layerprogress")]
    pub layer_progress: bool,
    #[serde(default)]
    pub camera: Option<CameraConfig>,
}

impl DeviceConfig {
    /// 设备 API 的基础地址（无末尾斜杠）
    pub fn base_url(&self) -> Option<String> {
        match self.protocol {
            ProtocolKind::PrusaLink => self.host.as_ref().map(|host| {
                let host = host.trim_end_matches('/');
                if host.starts_with("http://") || host.starts_with("https://") {
                    host.to_string()
                } else {
                    format!("http://{}:{}", host, self.port.unwrap_or(80))
                }
            }),
            ProtocolKind::OctoPrint => self
                .url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn status_interval_secs(&self) -> u64 {
        self.status_interval
            .unwrap_or_else(|| GlobalSettings::default().status_interval)
    }
}

/// Telegram 配置（token/chat_id 可来自环境变量 APITOKEN/CHATID）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
    pub min_urgency: Urgency,
    pub timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            min_urgency: Urgency::Low,
            timeout_secs: 30,
        }
    }
}

/// MQTT 事件总线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// 事件主题前缀，实际主题为 `{prefix}/{device_id}`
    pub topic_prefix: String,
    /// 可选的状态屏主题
    pub display_topic: Option<String>,
    pub display_color: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "printwatch".to_string(),
            username: None,
            password: None,
            topic_prefix: "printwatch/printers".to_string(),
            display_topic: None,
            display_color: "cc4400".to_string(),
            keep_alive_secs: 15,
        }
    }
}

/// 根配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(alias = "devices")]
    pub printers: Vec<DeviceConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramSettings>,
    #[serde(default)]
    pub mqtt: Option<MqttSettings>,
}

impl AppConfig {
    /// 从 YAML 字符串解析并校验
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut config: AppConfig = serde_yaml::from_str(text)
            .map_err(|e| WatchError::Configuration(format!("invalid YAML: {}", e)))?;
        config.apply_defaults();

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(WatchError::Configuration(errors.join("; ")));
        }
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WatchError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&text)?;
        info!(
            path = %path.display(),
            printers = config.printers.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// 按优先级解析配置文件路径
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        if let Some(path) = explicit {
            return path;
        }
        for var in ["PRINTWATCH_CONFIG", "INPUTFILE"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!(var, path = %path, "Using config path from environment");
                    return PathBuf::from(path);
                }
            }
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("printwatch").join("config.yaml"))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    /// 补全依赖全局设置的字段，并合并环境变量中的 Telegram 凭据
    fn apply_defaults(&mut self) {
        let status_interval = self.settings.status_interval;
        for printer in &mut self.printers {
            printer.status_interval.get_or_insert(status_interval);
        }

        let env_token = std::env::var("APITOKEN").ok().filter(|v| !v.is_empty());
        let env_chat = std::env::var("CHATID").ok().filter(|v| !v.is_empty());
        if self.telegram.is_none() && env_token.is_some() && env_chat.is_some() {
            self.telegram = Some(TelegramSettings::default());
        }
        if let Some(telegram) = self.telegram.as_mut() {
            if telegram.token.is_none() {
                telegram.token = env_token;
            }
            if telegram.chat_id.is_none() {
                telegram.chat_id = env_chat;
            }
        }
    }

    /// 校验配置，返回所有错误
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.settings.interval == 0 {
            errors.push("settings.interval must be greater than 0".to_string());
        }
        if self.settings.poll_timeout_secs == 0 {
            errors.push("settings.poll_timeout_secs must be greater than 0".to_string());
        }
        if self.printers.is_empty() {
            errors.push("no printers configured".to_string());
        }

        let mut seen = HashSet::new();
        for (i, printer) in self.printers.iter().enumerate() {
            if printer.id.trim().is_empty() {
                errors.push(format!("printers[{}]: id is empty", i));
            } else if !seen.insert(printer.id.as_str()) {
                errors.push(format!("printers[{}]: duplicate id '{}'", i, printer.id));
            }
            if printer.api_key.trim().is_empty() {
                errors.push(format!("printer '{}': api key is missing", printer.id));
            }
            match printer.protocol {
                ProtocolKind::PrusaLink if printer.host.is_none() => {
                    errors.push(format!("printer '{}': prusalink requires host", printer.id));
                }
                ProtocolKind::OctoPrint if printer.url.is_none() => {
                    errors.push(format!("printer '{}': octoprint requires url", printer.id));
                }
                _ => {}
            }
            if let Some(camera) = &printer.camera {
                if camera.snapshot_url.trim().is_empty() {
                    errors.push(format!("printer '{}': camera snapshot_url is empty", printer.id));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
printers:
  - id: mk4
    protocol: prusalink
    host: 192.168.1.20
    api_key: secret
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.settings.interval, 60);
        assert_eq!(config.settings.cooldown_secs, 600);
        assert_eq!(config.printers[0].status_interval, Some(900));
        assert!(config.mqtt.is_none());
    }

    #[test]
    fn test_prusalink_base_url_uses_port() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.printers[0].base_url().unwrap(), "http://192.168.1.20:80");
    }

    #[test]
    fn test_octoprint_base_url_trims_slash() {
        let yaml = r#"
printers:
  - id: ender
    protocol: octoprint
    url: http://octopi.local/
    api_key: k
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.printers[0].base_url().unwrap(), "http://octopi.local");
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        let json = serde_json::to_value(&config.printers[0]).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["protocol"], "prusalink");
    }
}
