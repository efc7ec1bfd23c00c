//! 持久化设置
//!
//! 进程内唯一的设置对象：启动时加载一次，之后所有读取都来自内存副本，
//! 每次 `set` 立即整体写回 properties 文件（单写者，不做文件锁）。

use crate::data::{DataError, PropertiesManager, Result};
use crate::models::{Mirror, MirrorConfig, TelemetryMode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// 应用配置目录名
pub const APP_DIR_NAME: &str = "ruyisdk-ide";
/// 配置文件名
pub const SETTINGS_FILE_NAME: &str = "settings.properties";

pub const ISCAS_MIRROR_URL: &str = "https://mirror.iscas.ac.cn/git/ruyisdk/packages-index.git";
pub const GITHUB_MIRROR_URL: &str = "https://github.com/ruyisdk/packages-index.git";

const DEFAULT_RESCAN_DELAY_MS: u64 = 500;

/// 配置键
pub mod keys {
    pub const INSTALL_PATH: &str = "ruyi.install.path";
    pub const MIRROR_ISCAS_ENABLED: &str = "ruyi.mirror.iscas.enabled";
    pub const MIRROR_GITHUB_ENABLED: &str = "ruyi.mirror.github.enabled";
    pub const MIRROR_CUSTOM_ENABLED: &str = "ruyi.mirror.custom.enabled";
    pub const MIRROR_CUSTOM_URL: &str = "ruyi.mirror.custom.url";
    pub const TELEMETRY_MODE: &str = "ruyi.telemetry.mode";
    pub const CHECK_ON_STARTUP: &str = "ruyi.check.on_startup";
    pub const VENV_RESCAN_DELAY_MS: &str = "ruyi.venv.rescan_delay_ms";
}

/// 平台默认安装目录 `~/.local/bin`
pub fn default_install_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".local").join("bin"))
        .unwrap_or_default()
}

/// 配置文件路径：`$XDG_CONFIG_HOME/ruyisdk-ide/settings.properties`，
/// 未设置时回退到 `~/.config/ruyisdk-ide/settings.properties`
pub fn default_settings_path() -> Result<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() && Path::new(&dir).is_absolute() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or_else(|| DataError::NoConfigDir("HOME is not set".to_string()))?
            .join(".config"),
    };
    Ok(base.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

fn default_values() -> BTreeMap<String, String> {
    let pairs = [
        (
            keys::INSTALL_PATH,
            default_install_path().to_string_lossy().to_string(),
        ),
        (keys::MIRROR_ISCAS_ENABLED, "true".to_string()),
        (keys::MIRROR_GITHUB_ENABLED, "true".to_string()),
        (keys::MIRROR_CUSTOM_ENABLED, "false".to_string()),
        (keys::MIRROR_CUSTOM_URL, String::new()),
        (keys::TELEMETRY_MODE, TelemetryMode::On.as_str().to_string()),
        (keys::CHECK_ON_STARTUP, "true".to_string()),
        (
            keys::VENV_RESCAN_DELAY_MS,
            DEFAULT_RESCAN_DELAY_MS.to_string(),
        ),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// 设置存储
pub struct ConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    manager: PropertiesManager,
}

impl ConfigStore {
    /// 打开默认位置的配置
    pub fn open_default() -> Result<Self> {
        Self::open(default_settings_path()?)
    }

    /// 打开指定配置文件
    ///
    /// 文件不存在时先写入一套默认值；已存在的文件只读取，不补写缺失的键。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manager = PropertiesManager::new();

        let values = if path.exists() {
            let values = manager.read(&path)?;
            tracing::debug!(path = %path.display(), count = values.len(), "已加载设置");
            values
        } else {
            let defaults = default_values();
            manager.write(&path, &defaults)?;
            tracing::info!(path = %path.display(), "首次运行，已写入默认设置");
            defaults
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
            manager,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取值；文件中没有时返回默认值，未知键返回空串
    pub fn get(&self, key: &str) -> String {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        match values.get(key) {
            Some(value) => value.clone(),
            None => default_values().remove(key).unwrap_or_default(),
        }
    }

    /// 设置并立即持久化；写盘失败时内存中的值保持不变
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        self.manager.write(&self.path, &updated)?;
        *values = updated;
        tracing::debug!(key, value, "设置已保存");
        Ok(())
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn get_bool(&self, key: &str) -> bool {
        match self.get(key).trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            other => {
                let fallback = default_values()
                    .get(key)
                    .map(|v| v == "true")
                    .unwrap_or(false);
                tracing::warn!(key, value = other, fallback, "布尔配置值无效，使用默认值");
                fallback
            }
        }
    }

    // ==================== 类型化访问 ====================

    /// 安装目录，空字符串表示未配置
    pub fn install_path(&self) -> Option<PathBuf> {
        let value = self.get(keys::INSTALL_PATH);
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    pub fn set_install_path(&self, path: &Path) -> Result<()> {
        self.set(keys::INSTALL_PATH, &path.to_string_lossy())
    }

    /// 当前镜像配置（内置两个镜像加一个自定义镜像）
    pub fn mirrors(&self) -> MirrorConfig {
        MirrorConfig::new(vec![
            Mirror {
                name: MirrorConfig::CUSTOM.to_string(),
                url: self.get(keys::MIRROR_CUSTOM_URL).trim().to_string(),
                priority: 0,
                enabled: self.get_bool(keys::MIRROR_CUSTOM_ENABLED),
            },
            Mirror {
                name: "iscas".to_string(),
                url: ISCAS_MIRROR_URL.to_string(),
                priority: 1,
                enabled: self.get_bool(keys::MIRROR_ISCAS_ENABLED),
            },
            Mirror {
                name: "github".to_string(),
                url: GITHUB_MIRROR_URL.to_string(),
                priority: 2,
                enabled: self.get_bool(keys::MIRROR_GITHUB_ENABLED),
            },
        ])
    }

    /// 最高优先级的已启用镜像 URL
    pub fn repository_url(&self) -> Option<String> {
        self.mirrors().preferred().map(|m| m.url.clone())
    }

    pub fn set_mirror_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let key = match name {
            "iscas" => keys::MIRROR_ISCAS_ENABLED,
            "github" => keys::MIRROR_GITHUB_ENABLED,
            MirrorConfig::CUSTOM => keys::MIRROR_CUSTOM_ENABLED,
            other => {
                return Err(DataError::InvalidValue {
                    key: "mirror".to_string(),
                    value: other.to_string(),
                })
            }
        };
        self.set(key, if enabled { "true" } else { "false" })
    }

    pub fn set_custom_mirror_url(&self, url: &str) -> Result<()> {
        self.set(keys::MIRROR_CUSTOM_URL, url.trim())
    }

    pub fn telemetry_mode(&self) -> TelemetryMode {
        let value = self.get(keys::TELEMETRY_MODE);
        TelemetryMode::parse(&value).unwrap_or_else(|| {
            tracing::warn!(value = %value, "遥测模式无效，使用默认值 ON");
            TelemetryMode::default()
        })
    }

    pub fn set_telemetry_mode(&self, mode: TelemetryMode) -> Result<()> {
        self.set(keys::TELEMETRY_MODE, mode.as_str())
    }

    /// 启动时是否自动检查 ruyi 版本
    pub fn auto_check(&self) -> bool {
        self.get_bool(keys::CHECK_ON_STARTUP)
    }

    pub fn set_auto_check(&self, enabled: bool) -> Result<()> {
        self.set(keys::CHECK_ON_STARTUP, if enabled { "true" } else { "false" })
    }

    /// 工作区变化后重新扫描 venv 前的静默时间
    pub fn venv_rescan_delay(&self) -> Duration {
        let value = self.get(keys::VENV_RESCAN_DELAY_MS);
        let millis = value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "venv 重扫延迟无效，使用默认值");
            DEFAULT_RESCAN_DELAY_MS
        });
        Duration::from_millis(millis)
    }

    pub fn set_venv_rescan_delay(&self, delay: Duration) -> Result<()> {
        self.set(keys::VENV_RESCAN_DELAY_MS, &delay.as_millis().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> PathBuf {
        dir.path().join(APP_DIR_NAME).join(SETTINGS_FILE_NAME)
    }

    #[test]
    fn fresh_directory_gets_defaults_written() {
        let temp = TempDir::new().unwrap();
        let path = settings_in(&temp);
        let store = ConfigStore::open(&path).unwrap();

        assert!(path.exists(), "defaults should be written on first use");
        assert_eq!(store.install_path(), Some(default_install_path()));
        assert_eq!(store.telemetry_mode(), TelemetryMode::On);
        assert!(store.auto_check());

        let mirrors = store.mirrors();
        let active: Vec<&str> = mirrors.active().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(active, vec!["iscas", "github"]);
        assert!(!mirrors.custom().unwrap().enabled);

        let on_disk = PropertiesManager::new().read(&path).unwrap();
        assert_eq!(on_disk.get(keys::TELEMETRY_MODE).unwrap(), "ON");
        assert_eq!(on_disk.get(keys::MIRROR_CUSTOM_URL).unwrap(), "");
    }

    #[test]
    fn second_startup_keeps_user_values() {
        let temp = TempDir::new().unwrap();
        let path = settings_in(&temp);

        let store = ConfigStore::open(&path).unwrap();
        store.set_telemetry_mode(TelemetryMode::Off).unwrap();
        store.set_install_path(Path::new("/opt/ruyi/bin")).unwrap();
        drop(store);

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.telemetry_mode(), TelemetryMode::Off);
        assert_eq!(reopened.install_path(), Some(PathBuf::from("/opt/ruyi/bin")));
    }

    #[test]
    fn existing_file_without_key_reads_default_without_writing() {
        let temp = TempDir::new().unwrap();
        let path = settings_in(&temp);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "ruyi.telemetry.mode=LOCAL\n").unwrap();

        let store = ConfigStore::open(&path).unwrap();
        assert_eq!(store.telemetry_mode(), TelemetryMode::Local);
        assert!(store.auto_check());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ruyi.telemetry.mode=LOCAL\n"
        );
    }

    #[test]
    fn set_persists_immediately() {
        let temp = TempDir::new().unwrap();
        let path = settings_in(&temp);
        let store = ConfigStore::open(&path).unwrap();

        store.set_custom_mirror_url(" https://example.com/index.git ").unwrap();
        store.set_mirror_enabled("custom", true).unwrap();

        let on_disk = PropertiesManager::new().read(&path).unwrap();
        assert_eq!(
            on_disk.get(keys::MIRROR_CUSTOM_URL).unwrap(),
            "https://example.com/index.git"
        );
        assert_eq!(
            store.repository_url().as_deref(),
            Some("https://example.com/index.git")
        );
    }

    #[test]
    fn unknown_mirror_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::open(settings_in(&temp)).unwrap();
        assert!(store.set_mirror_enabled("gitee", true).is_err());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::open(settings_in(&temp)).unwrap();
        store.set(keys::TELEMETRY_MODE, "sometimes").unwrap();
        store.set(keys::CHECK_ON_STARTUP, "perhaps").unwrap();
        store.set(keys::VENV_RESCAN_DELAY_MS, "soon").unwrap();

        assert_eq!(store.telemetry_mode(), TelemetryMode::On);
        assert!(store.auto_check());
        assert_eq!(store.venv_rescan_delay(), Duration::from_millis(500));
    }

    #[test]
    fn empty_install_path_is_none() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::open(settings_in(&temp)).unwrap();
        store.set(keys::INSTALL_PATH, "   ").unwrap();
        assert_eq!(store.install_path(), None);
    }

    #[test]
    fn rescan_delay_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::open(settings_in(&temp)).unwrap();
        store.set_venv_rescan_delay(Duration::from_millis(1200)).unwrap();
        assert_eq!(store.venv_rescan_delay(), Duration::from_millis(1200));
    }

    struct XdgGuard(Option<std::ffi::OsString>);

    impl XdgGuard {
        fn set(value: &Path) -> Self {
            let old = env::var_os("XDG_CONFIG_HOME");
            env::set_var("XDG_CONFIG_HOME", value);
            Self(old)
        }
    }

    impl Drop for XdgGuard {
        fn drop(&mut self) {
            match &self.0 {
                Some(val) => env::set_var("XDG_CONFIG_HOME", val),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn default_path_follows_xdg_config_home() {
        let temp = TempDir::new().unwrap();
        let _guard = XdgGuard::set(temp.path());
        assert_eq!(default_settings_path().unwrap(), settings_in(&temp));

        let store = ConfigStore::open_default().unwrap();
        assert_eq!(store.path(), settings_in(&temp).as_path());
    }

    #[test]
    #[serial]
    fn relative_xdg_config_home_is_ignored() {
        let _guard = XdgGuard::set(Path::new("relative/dir"));
        let path = default_settings_path().unwrap();
        assert!(path.ends_with(Path::new(".config").join(APP_DIR_NAME).join(SETTINGS_FILE_NAME)));
    }
}
