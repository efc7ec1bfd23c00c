// 配置相关的值类型：日志配置、遥测模式、镜像列表

use serde::{Deserialize, Serialize};
use std::fmt;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 日志输出目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    /// 日志目录，None 时使用默认缓存目录
    #[serde(default)]
    pub file_path: Option<String>,
}

/// ruyi 遥测模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TelemetryMode {
    #[default]
    On,
    Local,
    Off,
}

impl TelemetryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryMode::On => "ON",
            TelemetryMode::Local => "LOCAL",
            TelemetryMode::Off => "OFF",
        }
    }

    /// 大小写不敏感解析，未知值返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ON" => Some(TelemetryMode::On),
            "LOCAL" => Some(TelemetryMode::Local),
            "OFF" => Some(TelemetryMode::Off),
            _ => None,
        }
    }

    /// 对应 `ruyi telemetry <verb>` 的子命令
    pub fn cli_verb(&self) -> &'static str {
        match self {
            TelemetryMode::On => "consent",
            TelemetryMode::Local => "local",
            TelemetryMode::Off => "optout",
        }
    }
}

impl fmt::Display for TelemetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 软件包仓库镜像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub url: String,
    /// 0 为最高优先级
    pub priority: u32,
    pub enabled: bool,
}

/// 镜像列表，最多包含一个用户自定义镜像
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub mirrors: Vec<Mirror>,
}

impl MirrorConfig {
    pub const CUSTOM: &'static str = "custom";

    pub fn new(mirrors: Vec<Mirror>) -> Self {
        Self { mirrors }
    }

    /// 已启用且 URL 非空的镜像，按优先级升序（稳定排序）
    pub fn active(&self) -> Vec<&Mirror> {
        let mut active: Vec<&Mirror> = self
            .mirrors
            .iter()
            .filter(|m| m.enabled && !m.url.trim().is_empty())
            .collect();
        active.sort_by_key(|m| m.priority);
        active
    }

    /// 最高优先级的可用镜像
    pub fn preferred(&self) -> Option<&Mirror> {
        self.active().into_iter().next()
    }

    pub fn custom(&self) -> Option<&Mirror> {
        self.mirrors.iter().find(|m| m.name == Self::CUSTOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(name: &str, url: &str, priority: u32, enabled: bool) -> Mirror {
        Mirror {
            name: name.to_string(),
            url: url.to_string(),
            priority,
            enabled,
        }
    }

    #[test]
    fn test_active_filters_and_sorts() {
        let config = MirrorConfig::new(vec![
            mirror("github", "https://github.com/x.git", 2, true),
            mirror("custom", "https://example.com/x.git", 0, false),
            mirror("iscas", "https://mirror.iscas.ac.cn/x.git", 1, true),
        ]);
        let names: Vec<&str> = config.active().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["iscas", "github"]);
        assert_eq!(config.preferred().unwrap().name, "iscas");
    }

    #[test]
    fn test_enabled_custom_without_url_is_skipped() {
        let config = MirrorConfig::new(vec![
            mirror("custom", "  ", 0, true),
            mirror("github", "https://github.com/x.git", 2, true),
        ]);
        assert_eq!(config.preferred().unwrap().name, "github");
        assert!(config.custom().is_some());
    }

    #[test]
    fn test_no_active_mirror() {
        let config = MirrorConfig::new(vec![mirror("github", "https://g", 2, false)]);
        assert!(config.preferred().is_none());
    }

    #[test]
    fn test_telemetry_mode_parse() {
        assert_eq!(TelemetryMode::parse("on"), Some(TelemetryMode::On));
        assert_eq!(TelemetryMode::parse(" LOCAL "), Some(TelemetryMode::Local));
        assert_eq!(TelemetryMode::parse("Off"), Some(TelemetryMode::Off));
        assert_eq!(TelemetryMode::parse("maybe"), None);
        assert_eq!(TelemetryMode::Off.cli_verb(), "optout");
        assert_eq!(TelemetryMode::On.to_string(), "ON");
    }
}
