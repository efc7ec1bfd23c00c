//! ruyi porcelain 输出解析
//!
//! porcelain 模式输出的是若干个首尾相接的 JSON 对象，中间可能夹杂普通日志行。
//! 这里用花括号深度计数找出每个 `{...}` 片段并逐个独立解析：
//! 坏掉的片段只计入 `skipped`，孤立或未闭合的 `{` 不影响其余记录。

use crate::models::{NewsItem, PackageRecord, PackageVersion, ProfileRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

pub const PKG_LIST_TYPE: &str = "pkglistoutput-v1";
pub const NEWS_ITEM_TYPE: &str = "newsitem-v1";
pub const LOG_TYPE: &str = "log-v1";

/// 首选的新闻语言
pub const PREFERRED_LANG: &str = "en_US";

/// 一次解析的结果："N 条成功，M 条跳过"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReport<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> ParseReport<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T> Default for ParseReport<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 找到与 `start` 处的 `{` 配对的 `}`，直到文本结束都没有闭合时返回 None
///
/// 字符串字面量（含转义）中的花括号不参与计数。
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// 切出并逐个解析 `{...}` 片段
///
/// 未闭合的 `{`（日志行里的孤立括号、被截断的结尾）和解析失败的片段都从下一个字节
/// 重新开始查找，所以它们不会吞掉后面的完整对象。只有闭合但解析失败的片段计入 `skipped`。
pub fn parse_objects(text: &str) -> ParseReport<Value> {
    let bytes = text.as_bytes();
    let mut report = ParseReport::new();
    let mut pos = 0usize;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') {
        let start = pos + offset;
        let Some(end) = matching_brace(bytes, start) else {
            pos = start + 1;
            continue;
        };

        let span = &text[start..=end];
        match serde_json::from_str::<Value>(span) {
            Ok(value) => {
                report.records.push(value);
                pos = end + 1;
            }
            Err(e) => {
                tracing::debug!(error = %e, span_len = span.len(), "跳过无法解析的 porcelain 片段");
                report.skipped += 1;
                pos = start + 1;
            }
        }
    }
    report
}

fn object_type(value: &Value) -> Option<&str> {
    value.get("ty").and_then(Value::as_str)
}

/// ruyi 自己的日志对象转发到 tracing，返回是否已处理
fn forward_log(value: &Value) -> bool {
    if object_type(value) != Some(LOG_TYPE) {
        return false;
    }
    let lvl = value.get("lvl").and_then(Value::as_str).unwrap_or("I");
    let msg = value.get("msg").and_then(Value::as_str).unwrap_or_default();
    tracing::debug!(target: "ruyi", lvl, "{msg}");
    true
}

#[derive(Deserialize)]
struct RawPackage {
    category: String,
    name: String,
    #[serde(default)]
    vers: Vec<RawPackageVersion>,
}

#[derive(Deserialize)]
struct RawPackageVersion {
    #[serde(default)]
    semver: Option<String>,
    #[serde(default)]
    is_installed: bool,
}

/// 解析 `ruyi --porcelain list`
///
/// 接受 `ty` 缺省或为 `pkglistoutput-v1` 的对象；必须有 `category`/`name`，
/// 且至少有一个可用的版本。
pub fn parse_package_list(text: &str) -> ParseReport<PackageRecord> {
    let values = parse_objects(text);
    let mut report = ParseReport {
        records: Vec::new(),
        skipped: values.skipped,
    };

    for value in values.records {
        if forward_log(&value) {
            continue;
        }
        match object_type(&value) {
            None | Some(PKG_LIST_TYPE) => {}
            Some(_) => {
                report.skipped += 1;
                continue;
            }
        }

        let raw: RawPackage = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "软件包记录缺少必要字段");
                report.skipped += 1;
                continue;
            }
        };

        let versions: Vec<PackageVersion> = raw
            .vers
            .into_iter()
            .filter_map(|v| {
                let semver = v.semver?.trim().to_string();
                (!semver.is_empty()).then_some(PackageVersion {
                    semver,
                    installed: v.is_installed,
                })
            })
            .collect();

        if raw.category.is_empty() || raw.name.is_empty() || versions.is_empty() {
            report.skipped += 1;
            continue;
        }

        report.records.push(PackageRecord {
            category: raw.category,
            name: raw.name,
            versions,
        });
    }

    report
}

#[derive(Deserialize)]
struct RawNewsItem {
    id: String,
    #[serde(default)]
    ord: u64,
    #[serde(default)]
    is_read: bool,
    #[serde(default)]
    langs: Vec<RawNewsLang>,
}

#[derive(Deserialize)]
struct RawNewsLang {
    lang: String,
    #[serde(default)]
    display_title: String,
    #[serde(default)]
    content: String,
}

/// 语言选择：`en_US` > 与当前 locale 一致 > 同语种 > 第一个
fn select_lang<'a>(langs: &'a [RawNewsLang], locale: &str) -> Option<&'a RawNewsLang> {
    let language = locale.split('_').next().unwrap_or(locale);
    langs
        .iter()
        .find(|l| l.lang == PREFERRED_LANG)
        .or_else(|| langs.iter().find(|l| l.lang == locale))
        .or_else(|| {
            langs
                .iter()
                .find(|l| !language.is_empty() && l.lang.split('_').next() == Some(language))
        })
        .or_else(|| langs.first())
}

/// 解析 `ruyi --porcelain news list`
pub fn parse_news_list(text: &str, locale: &str) -> ParseReport<NewsItem> {
    let values = parse_objects(text);
    let mut report = ParseReport {
        records: Vec::new(),
        skipped: values.skipped,
    };

    for value in values.records {
        if forward_log(&value) {
            continue;
        }
        if object_type(&value) != Some(NEWS_ITEM_TYPE) {
            report.skipped += 1;
            continue;
        }

        let raw: RawNewsItem = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "新闻记录格式错误");
                report.skipped += 1;
                continue;
            }
        };

        let Some(lang) = select_lang(&raw.langs, locale) else {
            report.skipped += 1;
            continue;
        };

        report.records.push(NewsItem {
            id: raw.id,
            ord: raw.ord,
            is_read: raw.is_read,
            lang: lang.lang.clone(),
            title: lang.display_title.clone(),
            content: lang.content.clone(),
        });
    }

    report
}

static PROFILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_.+-]*)(?:\s+\(needs quirks:\s*\{([^}]*)\}\))?$")
        .expect("invalid profile regex")
});

/// 解析 `ruyi list profiles` 的文本输出
///
/// 每行一个 profile，可带 `(needs quirks: {'xthead'})` 后缀；其他行计入 skipped。
pub fn parse_profiles(text: &str) -> ParseReport<ProfileRecord> {
    let mut report = ParseReport::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(caps) = PROFILE_LINE.captures(line) else {
            report.skipped += 1;
            continue;
        };
        let quirks = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|q| q.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                    .filter(|q| !q.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        report.records.push(ProfileRecord {
            name: caps[1].to_string(),
            quirks,
        });
    }
    report
}

/// 当前进程的 locale，如 `zh_CN`；取 LC_ALL、LC_MESSAGES、LANG 中第一个非空值
pub fn current_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|v| !v.is_empty())
        .map(|v| normalize_locale(&v))
        .filter(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .unwrap_or_else(|| PREFERRED_LANG.to_string())
}

/// `zh_CN.UTF-8@pinyin` → `zh_CN`
fn normalize_locale(raw: &str) -> String {
    raw.split(['.', '@']).next().unwrap_or_default().to_string()
}
