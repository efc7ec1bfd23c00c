//! ruyi 安装与升级
//!
//! 五个阶段严格按顺序执行，任一阶段失败即终止：
//! 1. 准备：创建安装目录，检查剩余空间
//! 2. 下载：按主镜像、备用镜像的顺序尝试
//! 3. 权限：设置可执行位
//! 4. 校验：重新执行 `ruyi --version`，失败只记警告
//! 5. 配置：设置仓库地址、刷新索引、设置遥测模式

pub mod downloader;
pub mod progress;

pub use downloader::{download_with_fallback, ArtifactFetcher, HttpFetcher};
pub use progress::{InstallListener, NoopListener, ProgressThrottle};

use crate::core::error::{AppError, AppResult};
use crate::models::{ReleaseInfo, ToolVersion};
use crate::services::cli::{RuyiCommands, TOOL_BINARY};
use crate::services::config_store::ConfigStore;
use crate::services::release::ReleaseSource;
use crate::utils::{available_space, make_executable, PlatformInfo, BYTES_PER_MIB};
use progress::scale_percent;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// 安装目录所需的最小剩余空间
pub const MIN_FREE_SPACE_BYTES: u64 = 500 * BYTES_PER_MIB;

// 各阶段在总体进度中的区间
const PREPARE_DONE: u8 = 5;
const DOWNLOAD_END: u8 = 85;
const PERMISSION_DONE: u8 = 88;
const VALIDATE_DONE: u8 = 90;
const CONFIGURE_REPO_DONE: u8 = 93;
const CONFIGURE_UPDATE_DONE: u8 = 97;

/// 一次成功安装的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub release: ReleaseInfo,
    pub binary_path: PathBuf,
    /// 校验阶段读到的版本，读不到时为 None
    pub installed_version: Option<ToolVersion>,
}

/// 安装器
pub struct Installer {
    config: Arc<ConfigStore>,
    commands: RuyiCommands,
    releases: Arc<dyn ReleaseSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
    platform: PlatformInfo,
    min_free_bytes: u64,
}

impl Installer {
    pub fn new(
        config: Arc<ConfigStore>,
        commands: RuyiCommands,
        releases: Arc<dyn ReleaseSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            config,
            commands,
            releases,
            fetcher,
            platform: PlatformInfo::current(),
            min_free_bytes: MIN_FREE_SPACE_BYTES,
        }
    }

    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }

    /// 执行完整安装
    pub async fn install(
        &self,
        listener: &dyn InstallListener,
        cancel: &CancellationToken,
    ) -> AppResult<InstallReport> {
        let result = self.run_phases(listener, cancel).await;
        match &result {
            Ok(report) => {
                tracing::info!(version = %report.release.version, path = %report.binary_path.display(), "ruyi 安装完成");
            }
            Err(AppError::Cancelled) => {
                listener.log_message("Installation cancelled.");
                tracing::info!("安装已取消");
            }
            Err(e) => {
                listener.log_message(&format!("Installation failed: {e}"));
                tracing::error!(error = %e, "安装失败");
            }
        }
        result
    }

    async fn run_phases(
        &self,
        listener: &dyn InstallListener,
        cancel: &CancellationToken,
    ) -> AppResult<InstallReport> {
        check_cancel(cancel)?;
        let install_dir = self.prepare(listener).await?;
        check_cancel(cancel)?;

        let (release, binary_path) = self.download(&install_dir, listener, cancel).await?;
        check_cancel(cancel)?;

        self.set_permissions(&binary_path, listener)?;
        check_cancel(cancel)?;

        let installed_version = self.validate(listener).await;
        check_cancel(cancel)?;

        self.configure(listener).await?;
        listener.progress_changed(100, "Installation complete");

        Ok(InstallReport {
            release,
            binary_path,
            installed_version,
        })
    }

    /// 阶段 1：准备安装目录
    pub async fn prepare(&self, listener: &dyn InstallListener) -> AppResult<PathBuf> {
        listener.progress_changed(0, "Preparing install directory");

        let install_dir = self.config.install_path().ok_or_else(|| {
            AppError::Environment("Install directory is not configured.".to_string())
        })?;

        tokio::fs::create_dir_all(&install_dir).await.map_err(|e| {
            AppError::Environment(format!(
                "Cannot create install directory {}: {e}",
                install_dir.display()
            ))
        })?;
        listener.log_message(&format!("Install directory: {}", install_dir.display()));

        let available = available_space(&install_dir)
            .map_err(|e| AppError::io(format!("query free space of {}", install_dir.display()), e))?;
        if available < self.min_free_bytes {
            return Err(AppError::Environment(format!(
                "Not enough disk space in {}: {} MB required, {} MB available.",
                install_dir.display(),
                self.min_free_bytes / BYTES_PER_MIB,
                available / BYTES_PER_MIB
            )));
        }

        tracing::debug!(dir = %install_dir.display(), available_mb = available / BYTES_PER_MIB, "安装目录就绪");
        listener.progress_changed(PREPARE_DONE, "Install directory ready");
        Ok(install_dir)
    }

    /// 阶段 2：下载并替换 `<installDir>/ruyi`
    ///
    /// 下载失败或取消时已有的 ruyi 保持不变。
    pub async fn download(
        &self,
        install_dir: &Path,
        listener: &dyn InstallListener,
        cancel: &CancellationToken,
    ) -> AppResult<(ReleaseInfo, PathBuf)> {
        listener.log_message("Fetching release information...");
        let platform_key = self.platform.platform_key();
        let release = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            r = self.releases.latest_release(&platform_key) => r?,
        };
        listener.log_message(&format!(
            "Latest release: {} ({})",
            release.version, release.filename
        ));

        let dest = install_dir.join(TOOL_BINARY);
        let sources = release.sources();
        let throttle = Mutex::new(ProgressThrottle::new());

        let on_progress = |transferred: u64, total: Option<u64>| {
            let reported = throttle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .update(transferred, total);
            if let Some(percent) = reported {
                listener.progress_changed(
                    scale_percent(PREPARE_DONE, DOWNLOAD_END, percent),
                    &format!("Downloading {} ({percent}%)", release.filename),
                );
            }
        };
        let on_attempt = |index: usize, url: &str| {
            let label = if index == 0 { "primary" } else { "fallback" };
            listener.log_message(&format!("Downloading from {label} mirror: {url}"));
        };

        let bytes = download_with_fallback(
            self.fetcher.as_ref(),
            &sources,
            &dest,
            cancel,
            &on_progress,
            &on_attempt,
        )
        .await?;

        listener.log_message(&format!(
            "Downloaded {bytes} bytes to {}",
            dest.display()
        ));
        listener.progress_changed(DOWNLOAD_END, "Download complete");
        Ok((release, dest))
    }

    /// 阶段 3：设置可执行权限
    pub fn set_permissions(&self, binary: &Path, listener: &dyn InstallListener) -> AppResult<()> {
        make_executable(binary).map_err(|e| {
            AppError::Environment(format!(
                "Cannot mark {} as executable: {e}",
                binary.display()
            ))
        })?;
        listener.progress_changed(PERMISSION_DONE, "Executable permission set");
        Ok(())
    }

    /// 阶段 4：冒烟校验，失败只记警告
    pub async fn validate(&self, listener: &dyn InstallListener) -> Option<ToolVersion> {
        let version = self.commands.installed_version().await;
        match &version {
            Some(v) => listener.log_message(&format!("Installed ruyi {v}")),
            None => {
                tracing::warn!("安装后无法读取 ruyi 版本");
                listener.log_message("Warning: could not determine the installed ruyi version.");
            }
        }
        listener.progress_changed(VALIDATE_DONE, "Validation finished");
        version
    }

    /// 阶段 5：安装后配置
    pub async fn configure(&self, listener: &dyn InstallListener) -> AppResult<()> {
        match self.config.repository_url() {
            Some(url) => {
                listener.log_message(&format!("Setting package repository: {url}"));
                self.commands.set_repository_url(&url).await?;
            }
            None => {
                tracing::warn!("没有启用的镜像，跳过仓库地址设置");
                listener.log_message("No mirror enabled; keeping ruyi's default repository.");
            }
        }
        listener.progress_changed(CONFIGURE_REPO_DONE, "Repository configured");

        listener.log_message("Updating package index...");
        self.commands.update_index().await?;
        listener.progress_changed(CONFIGURE_UPDATE_DONE, "Package index updated");

        let mode = self.config.telemetry_mode();
        listener.log_message(&format!("Setting telemetry mode: {mode}"));
        self.commands.set_telemetry(mode).await?;
        Ok(())
    }
}

fn check_cancel(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::downloader::testing::FakeFetcher;
    use super::*;
    use crate::models::{RunResult, TelemetryMode};
    use crate::services::cli::commands::testing::ScriptedRunner;
    use crate::services::config_store::keys;
    use crate::services::version::testing::{release_info, StaticRelease};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingListener {
        progress: Mutex<Vec<(u8, String)>>,
        logs: Mutex<Vec<String>>,
    }

    impl InstallListener for RecordingListener {
        fn progress_changed(&self, percent: u8, message: &str) {
            self.progress
                .lock()
                .unwrap()
                .push((percent, message.to_string()));
        }

        fn log_message(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_string());
        }
    }

    impl RecordingListener {
        fn percents(&self) -> Vec<u8> {
            self.progress.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    struct Fixture {
        temp: TempDir,
        config: Arc<ConfigStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config =
                Arc::new(ConfigStore::open(temp.path().join("settings.properties")).unwrap());
            config
                .set_install_path(&temp.path().join("bin"))
                .unwrap();
            Self { temp, config }
        }

        fn installer(&self, runner: Arc<ScriptedRunner>, fetcher: FakeFetcher) -> Installer {
            let release = release_info(ToolVersion::new(0, 39, 0));
            Installer::new(
                self.config.clone(),
                RuyiCommands::new(runner),
                StaticRelease::with(Ok(release), std::time::Duration::ZERO),
                Arc::new(fetcher),
            )
            .with_min_free_bytes(0)
        }
    }

    fn ok_runs(n: usize) -> Vec<RunResult> {
        let mut runs = vec![RunResult::new(0, "Ruyi 0.39.0\n")];
        runs.extend((1..n).map(|_| RunResult::new(0, "")));
        runs
    }

    fn good_fetcher() -> FakeFetcher {
        FakeFetcher::new([(
            "https://primary/ruyi-0.39.0.amd64",
            Ok(b"#!/bin/sh\necho Ruyi 0.39.0\n".repeat(20)),
        )])
    }

    #[tokio::test]
    async fn test_full_install_runs_all_phases_in_order() {
        let fx = Fixture::new();
        fx.config.set_telemetry_mode(TelemetryMode::Off).unwrap();
        let runner = ScriptedRunner::new(ok_runs(4));
        let installer = fx.installer(runner.clone(), good_fetcher());
        let listener = RecordingListener::default();

        let report = installer
            .install(&listener, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.binary_path, fx.temp.path().join("bin").join("ruyi"));
        assert_eq!(report.installed_version, Some(ToolVersion::new(0, 39, 0)));
        assert!(crate::utils::is_executable(&report.binary_path));
        assert_eq!(
            runner.call_lines(),
            vec![
                "--version".to_string(),
                format!("config set repo.remote {}", crate::services::config_store::ISCAS_MIRROR_URL),
                "update".to_string(),
                "telemetry optout".to_string(),
            ]
        );

        let percents = listener.percents();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(percents.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_insufficient_space_reports_required_and_available() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::new(Vec::new());
        let installer = fx
            .installer(runner.clone(), good_fetcher())
            .with_min_free_bytes(u64::MAX);

        let err = installer
            .install(&NoopListener, &CancellationToken::new())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AppError::Environment(_)));
        assert!(msg.contains("MB required"), "{msg}");
        assert!(msg.contains("MB available"), "{msg}");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_install_dir_is_environment_error() {
        let fx = Fixture::new();
        fx.config.set(keys::INSTALL_PATH, "").unwrap();
        let installer = fx.installer(ScriptedRunner::new(Vec::new()), good_fetcher());
        let err = installer
            .install(&NoopListener, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Environment(_)));
    }

    #[tokio::test]
    async fn test_validation_failure_is_only_a_warning() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::new(vec![
            RunResult::new(0, "garbled"),
            RunResult::new(0, ""),
            RunResult::new(0, ""),
            RunResult::new(0, ""),
        ]);
        let listener = RecordingListener::default();
        let report = fx
            .installer(runner, good_fetcher())
            .install(&listener, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.installed_version, None);
        assert!(listener
            .logs
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.starts_with("Warning")));
    }

    #[tokio::test]
    async fn test_configure_failure_names_the_step() {
        let fx = Fixture::new();
        let runner = ScriptedRunner::new(vec![
            RunResult::new(0, "Ruyi 0.39.0"),
            RunResult::new(0, ""),
            RunResult::new(1, "fatal: unable to access repository"),
        ]);
        let err = fx
            .installer(runner.clone(), good_fetcher())
            .install(&NoopListener, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AppError::Subprocess { step, output, .. } => {
                assert_eq!(step, "ruyi update");
                assert!(output.contains("unable to access"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        // 遥测设置不再执行
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_download_uses_fallback_once() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new([
            (
                "https://primary/ruyi-0.39.0.amd64",
                Err("HTTP 503".to_string()),
            ),
            ("https://fallback/ruyi-0.39.0.amd64", Ok(b"binary".to_vec())),
        ]);
        let installer = fx.installer(ScriptedRunner::new(ok_runs(4)), fetcher);
        let listener = RecordingListener::default();

        let install_dir = installer.prepare(&listener).await.unwrap();
        let (release, path) = installer
            .download(&install_dir, &listener, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(release.version, ToolVersion::new(0, 39, 0));
        assert_eq!(std::fs::read(path).unwrap(), b"binary");

        let logs = listener.logs.lock().unwrap();
        assert!(logs.iter().any(|l| l.contains("primary mirror")));
        assert!(logs.iter().any(|l| l.contains("fallback mirror")));
    }

    #[tokio::test]
    async fn test_failed_upgrade_leaves_working_ruyi_in_place() {
        let fx = Fixture::new();
        let bin_dir = fx.temp.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let existing = bin_dir.join("ruyi");
        std::fs::write(&existing, b"#!/bin/sh\necho Ruyi 0.38.0\n").unwrap();

        let fetcher = FakeFetcher::new([
            (
                "https://primary/ruyi-0.39.0.amd64",
                Err("HTTP 404 Not Found".to_string()),
            ),
            (
                "https://fallback/ruyi-0.39.0.amd64",
                Err("HTTP 503 Service Unavailable".to_string()),
            ),
        ]);
        let runner = ScriptedRunner::new(Vec::new());
        let err = fx
            .installer(runner.clone(), fetcher)
            .install(&NoopListener, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Network { .. }));
        assert_eq!(
            std::fs::read(&existing).unwrap(),
            b"#!/bin/sh\necho Ruyi 0.38.0\n"
        );
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_install_reports_cancelled() {
        let fx = Fixture::new();
        let token = CancellationToken::new();
        token.cancel();
        let err = fx
            .installer(ScriptedRunner::new(ok_runs(4)), good_fetcher())
            .install(&NoopListener, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!fx.temp.path().join("bin").join("ruyi").exists());
    }
}
