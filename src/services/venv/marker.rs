// ruyi-venv.toml 读取
//
// 只关心 `[config]` 段中的 `profile` 和 `sysroot`，其余内容交给 ruyi 自己处理。
// 逐行解析，坏行直接跳过。

use std::fs;
use std::path::Path;

/// venv 目录中的标记文件名
pub const MARKER_FILE: &str = "ruyi-venv.toml";

const CONFIG_SECTION: &str = "config";

/// 标记文件中读到的字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenvMarker {
    pub profile: Option<String>,
    pub sysroot: Option<String>,
}

/// 解析标记文件内容
pub fn parse_marker(content: &str) -> VenvMarker {
    let mut marker = VenvMarker::default();
    let mut in_config = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            in_config = line
                .strip_prefix('[')
                .and_then(|l| l.strip_suffix(']'))
                .map(|name| name.trim() == CONFIG_SECTION)
                .unwrap_or(false);
            continue;
        }

        if !in_config {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());
        match key.trim() {
            "profile" => marker.profile = Some(value),
            "sysroot" => marker.sysroot = Some(value),
            _ => {}
        }
    }

    marker
}

/// 去掉 TOML 字符串引号及其后的行内注释
fn unquote(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return rest[..end].to_string();
            }
        }
    }
    raw.split('#').next().unwrap_or_default().trim().to_string()
}

/// 读取 venv 目录中的标记文件，不存在或不可读时为 None
pub fn read_marker(venv_dir: &Path) -> Option<VenvMarker> {
    let path = venv_dir.join(MARKER_FILE);
    match fs::read_to_string(&path) {
        Ok(content) => Some(parse_marker(&content)),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = ?e, "无法读取 venv 标记文件");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn foreign_sections_are_ignored() {
        let marker = parse_marker("[other]\nprofile=wrong\n[config]\nprofile=right\nsysroot=/s\n");
        assert_eq!(marker.profile.as_deref(), Some("right"));
        assert_eq!(marker.sysroot.as_deref(), Some("/s"));
    }

    #[test]
    fn parses_quoted_values_and_comments() {
        let content = r#"
# generated by ruyi
[metadata]
desc = "RuyiSDK Virtual Environment"

[config]
# target
profile = "sipeed-lpi4a"   # board
sysroot = '/home/u/venv/sysroot'
unknown = 1
this line has no separator

[cached_v2]
profile = "nope"
"#;
        let marker = parse_marker(content);
        assert_eq!(marker.profile.as_deref(), Some("sipeed-lpi4a"));
        assert_eq!(marker.sysroot.as_deref(), Some("/home/u/venv/sysroot"));
    }

    #[test]
    fn missing_config_section_yields_nothing() {
        assert_eq!(parse_marker("profile=x\n[other]\nsysroot=/y"), VenvMarker::default());
        assert_eq!(parse_marker(""), VenvMarker::default());
        assert_eq!(parse_marker("[config\nprofile=x"), VenvMarker::default());
    }

    #[test]
    fn read_marker_from_dir() {
        let temp = TempDir::new().unwrap();
        assert!(read_marker(temp.path()).is_none());
        fs::write(temp.path().join(MARKER_FILE), "[config]\nprofile=\"generic\"\n").unwrap();
        assert_eq!(
            read_marker(temp.path()).unwrap().profile.as_deref(),
            Some("generic")
        );
    }
}
