//! Properties 文件管理器
//!
//! 扁平的 `key=value` 文件：
//! - 忽略 `#` / `!` 开头的注释和空行
//! - 值中的 `\`、换行按转义序列保存
//! - 写入时按键排序，自动创建父目录
//! - Unix 权限设置（0o600）

use crate::data::{DataError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Properties 文件管理器
pub struct PropertiesManager;

impl PropertiesManager {
    pub fn new() -> Self {
        Self
    }

    /// 读取为键值对；文件不存在视为错误，由调用方决定是否写入默认值
    pub fn read(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        let content = fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;

        Ok(content.lines().filter_map(parse_line).collect())
    }

    /// 整体写入（排序后的全量内容）
    pub fn write(&self, path: &Path, pairs: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }

        let mut content = String::from("# RuyiSDK IDE settings\n");
        for (key, value) in pairs {
            content.push_str(key);
            content.push('=');
            content.push_str(&escape(value));
            content.push('\n');
        }

        // 先写临时文件再改名，避免写一半时进程退出留下截断的配置
        let tmp_path = path.with_extension("properties.tmp");
        fs::write(&tmp_path, content).map_err(|e| DataError::io(&tmp_path, e))?;
        set_permissions(&tmp_path)?;
        fs::rename(&tmp_path, path).map_err(|e| DataError::io(path, e))?;

        Ok(())
    }
}

impl Default for PropertiesManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析一行
///
/// # 返回
///
/// - `Some((key, value))`: 成功解析
/// - `None`: 注释、空行或没有 `=` 的行
fn parse_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unescape(value.trim())))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(unix)]
fn set_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path).map_err(|e| DataError::io(path, e))?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms).map_err(|e| DataError::io(path, e))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
