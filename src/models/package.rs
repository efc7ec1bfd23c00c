// ruyi 输出解析得到的记录类型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 软件包的单个版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub semver: String,
    #[serde(default)]
    pub installed: bool,
}

/// `ruyi --porcelain list` 中的一条软件包记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub category: String,
    pub name: String,
    /// 保持 ruyi 输出的顺序
    pub versions: Vec<PackageVersion>,
}

impl PackageRecord {
    pub fn installed_versions(&self) -> impl Iterator<Item = &PackageVersion> {
        self.versions.iter().filter(|v| v.installed)
    }

    pub fn is_installed(&self) -> bool {
        self.versions.iter().any(|v| v.installed)
    }

    /// 第一个已安装版本（ruyi 按新到旧输出）
    pub fn latest_installed(&self) -> Option<&PackageVersion> {
        self.installed_versions().next()
    }
}

/// 新闻条目，已按语言优先级选定一种语言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub ord: u64,
    pub is_read: bool,
    pub lang: String,
    pub title: String,
    pub content: String,
}

/// `ruyi list profiles` 中的一条 profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    /// 需要的 quirks，空表示通用 profile
    pub quirks: Vec<String>,
}

/// 软件包原子：名称加可选的精确版本，对应 `name(==version)` 语法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAtom {
    pub name: String,
    pub version: Option<String>,
}

impl PackageAtom {
    pub fn new(name: impl Into<String>, version: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            version: version.map(Into::into),
        }
    }
}

impl fmt::Display for PackageAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version.as_deref() {
            Some(v) if !v.is_empty() => write!(f, "{}(=={})", self.name, v),
            _ => f.write_str(&self.name),
        }
    }
}
