// 版本检查
//
// 三步：本地版本 → 远程最新发布 → 比较。每一步之间检查取消信号，
// 同一时间只允许一次检查在进行，期间的新请求直接丢弃。

use crate::core::error::{AppError, AppResult};
use crate::models::{CheckOutcome, ReleaseInfo, ToolVersion};
use crate::services::cli::RuyiCommands;
use crate::services::release::ReleaseSource;
use crate::utils::PlatformInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 版本检查引擎
pub struct VersionCheckEngine {
    commands: RuyiCommands,
    releases: Arc<dyn ReleaseSource>,
    platform: PlatformInfo,
    in_flight: AtomicBool,
}

/// 检查结束时释放占用标记
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl VersionCheckEngine {
    pub fn new(commands: RuyiCommands, releases: Arc<dyn ReleaseSource>) -> Self {
        Self::with_platform(commands, releases, PlatformInfo::current())
    }

    pub fn with_platform(
        commands: RuyiCommands,
        releases: Arc<dyn ReleaseSource>,
        platform: PlatformInfo,
    ) -> Self {
        Self {
            commands,
            releases,
            platform,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_checking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 当前平台的最新发布
    pub async fn latest_release(&self) -> AppResult<ReleaseInfo> {
        self.releases
            .latest_release(&self.platform.platform_key())
            .await
    }

    /// 执行一次检查
    ///
    /// 已有检查在进行时返回 `None`，不排队。
    pub async fn check(&self, cancel: &CancellationToken) -> Option<AppResult<CheckOutcome>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("版本检查进行中，忽略新的请求");
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self.run_check(cancel).await;
        match &result {
            Ok(outcome) => tracing::info!(outcome = ?outcome, "版本检查完成"),
            Err(AppError::Cancelled) => tracing::info!("版本检查已取消"),
            Err(e) => tracing::warn!(error = %e, "版本检查失败"),
        }
        Some(result)
    }

    async fn run_check(&self, cancel: &CancellationToken) -> AppResult<CheckOutcome> {
        ensure_not_cancelled(cancel)?;

        // 1. 本地版本
        let installed = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            v = self.commands.installed_version() => v,
        };
        let Some(current) = installed else {
            return Ok(CheckOutcome::NeedsInstall {
                message: "ruyi is not installed or its version could not be determined."
                    .to_string(),
            });
        };
        ensure_not_cancelled(cancel)?;

        // 2. 远程最新版本，失败即检查失败
        let release = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            r = self.latest_release() => r?,
        };
        ensure_not_cancelled(cancel)?;

        // 3. 比较
        Ok(compare(current, release.version))
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

/// 根据已安装版本和最新版本给出结论
pub fn compare(current: ToolVersion, latest: ToolVersion) -> CheckOutcome {
    if current < latest {
        CheckOutcome::NeedsUpgrade {
            message: format!("ruyi {latest} is available (installed: {current})."),
            current,
            latest,
        }
    } else {
        CheckOutcome::UpToDate {
            message: format!("ruyi {current} is up to date."),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// 固定返回结果的发布源，可选地在返回前等待固定时长或等待 `gate` 放行
    pub struct StaticRelease {
        pub result: Mutex<Option<AppResult<ReleaseInfo>>>,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub gated: bool,
        pub gate: Notify,
    }

    impl StaticRelease {
        pub fn ok(version: ToolVersion) -> Arc<Self> {
            Self::with(Ok(release_info(version)), Duration::ZERO)
        }

        pub fn with(result: AppResult<ReleaseInfo>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                delay,
                calls: AtomicUsize::new(0),
                gated: false,
                gate: Notify::new(),
            })
        }

        /// 每次调用都阻塞到 `gate.notify_one()`
        pub fn gated(version: ToolVersion) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Ok(release_info(version)))),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                gated: true,
                gate: Notify::new(),
            })
        }
    }

    pub fn release_info(version: ToolVersion) -> ReleaseInfo {
        ReleaseInfo {
            filename: format!("ruyi-{version}.amd64"),
            primary_url: format!("https://primary/ruyi-{version}.amd64"),
            fallback_url: format!("https://fallback/ruyi-{version}.amd64"),
            channel: "stable".to_string(),
            version,
        }
    }

    #[async_trait]
    impl ReleaseSource for StaticRelease {
        async fn latest_release(&self, _platform_key: &str) -> AppResult<ReleaseInfo> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.gated {
                self.gate.notified().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let guard = self.result.lock().unwrap();
            match guard.as_ref() {
                Some(Ok(info)) => Ok(info.clone()),
                Some(Err(e)) => Err(AppError::Parse(e.to_string())),
                None => Err(AppError::Parse("no release".to_string())),
            }
        }
    }
}
