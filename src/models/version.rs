use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

static TRIPLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)\.([0-9]+)\.([0-9]+)$").expect("invalid version regex"));

/// ruyi 版本号 `major.minor.patch`
///
/// 比较与相等只看数值三元组；原始文本仅用于显示，
/// 因此 `01.2.3` 与 `1.2.3` 相等但各自按原样输出。
/// 各分量按十进制数字串比较，不受整数宽度限制。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    parts: [String; 3],
    text: String,
}

impl ToolVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            parts: [major.to_string(), minor.to_string(), patch.to_string()],
            text: format!("{major}.{minor}.{patch}"),
        }
    }

    /// 严格解析 `<major>.<minor>.<patch>`，任何不匹配都返回 None
    pub fn parse(value: &str) -> Option<Self> {
        let captures = TRIPLE_REGEX.captures(value)?;
        let part = |i: usize| captures.get(i).map(|m| normalize_digits(m.as_str()));
        Some(Self {
            parts: [part(1)?, part(2)?, part(3)?],
            text: value.to_string(),
        })
    }

    pub fn major(&self) -> &str {
        &self.parts[0]
    }

    pub fn minor(&self) -> &str {
        &self.parts[1]
    }

    pub fn patch(&self) -> &str {
        &self.parts[2]
    }
}

/// 去掉前导零，全零保留为 "0"
fn normalize_digits(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 规范化后的数字串：先比长度，再按字典序
fn cmp_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for ToolVersion {}

impl Hash for ToolVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .iter()
            .zip(other.parts.iter())
            .map(|(a, b)| cmp_digits(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ToolVersion::parse(&value).ok_or_else(|| format!("invalid version: {value}"))
    }
}

impl From<ToolVersion> for String {
    fn from(value: ToolVersion) -> Self {
        value.text
    }
}

/// 一次版本检查的结论，UI 层据此选择安装或升级向导
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckOutcome {
    NeedsInstall {
        message: String,
    },
    NeedsUpgrade {
        current: ToolVersion,
        latest: ToolVersion,
        message: String,
    },
    UpToDate {
        message: String,
    },
}

impl CheckOutcome {
    pub fn message(&self) -> &str {
        match self {
            CheckOutcome::NeedsInstall { message }
            | CheckOutcome::NeedsUpgrade { message, .. }
            | CheckOutcome::UpToDate { message } => message,
        }
    }
}

/// 当前平台的最新发布信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub version: ToolVersion,
    pub channel: String,
    pub filename: String,
    pub primary_url: String,
    pub fallback_url: String,
}

impl ReleaseInfo {
    /// 下载来源，固定顺序：主镜像、备用镜像（重复或为空的备用地址会被去掉）
    pub fn sources(&self) -> Vec<String> {
        let mut sources = vec![self.primary_url.clone()];
        if !self.fallback_url.is_empty() && self.fallback_url != self.primary_url {
            sources.push(self.fallback_url.clone());
        }
        sources
    }
}
