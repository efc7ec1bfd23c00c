//! ruyi 管理入口
//!
//! 组装各个服务并把界面层的请求投递到后台任务池。
//! 每个 `request_*` 立即返回一个完成信号，结果通过 `CoreEvent` 送出。

use crate::core::error::AppResult;
use crate::core::http::build_http_client;
use crate::models::VenvCreateRequest;
use crate::services::cli::{current_locale, CliBridge, RuyiCommands, ToolRunner};
use crate::services::config_store::ConfigStore;
use crate::services::events::{ChannelListener, CoreEvent, EventSender, Operation};
use crate::services::installer::{ArtifactFetcher, HttpFetcher, Installer};
use crate::services::release::{ReleaseClient, ReleaseSource};
use crate::services::venv::{RegistryScanner, VenvManager};
use crate::services::version::VersionCheckEngine;
use crate::services::worker::TaskPool;
use crate::services::workspace::{scan_venvs, VenvRescanScheduler, WorkspaceProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// 完成信号
pub type Completion = oneshot::Receiver<()>;

pub struct RuyiManager {
    config: Arc<ConfigStore>,
    commands: RuyiCommands,
    version: Arc<VersionCheckEngine>,
    installer: Arc<Installer>,
    venvs: Arc<VenvManager>,
    pool: TaskPool,
    events: EventSender,
    locale: String,
}

impl RuyiManager {
    /// 使用真实的子进程、HTTP 客户端组装
    pub fn new(config: Arc<ConfigStore>, events: EventSender) -> AppResult<Self> {
        let client = build_http_client()?;
        let runner: Arc<dyn ToolRunner> = Arc::new(CliBridge::new(config.clone()));
        let releases: Arc<dyn ReleaseSource> = Arc::new(ReleaseClient::with_client(
            client.clone(),
            crate::services::release::DEFAULT_API_BASE,
        ));
        let fetcher: Arc<dyn ArtifactFetcher> = Arc::new(HttpFetcher::new(client));

        Ok(Self::with_parts(
            config,
            runner,
            releases,
            fetcher,
            RegistryScanner::default_roots(),
            events,
        ))
    }

    pub fn with_parts(
        config: Arc<ConfigStore>,
        runner: Arc<dyn ToolRunner>,
        releases: Arc<dyn ReleaseSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
        registry: RegistryScanner,
        events: EventSender,
    ) -> Self {
        let commands = RuyiCommands::new(runner);
        let version = Arc::new(VersionCheckEngine::new(commands.clone(), releases.clone()));
        let installer = Arc::new(Installer::new(
            config.clone(),
            commands.clone(),
            releases,
            fetcher,
        ));
        let venvs = Arc::new(VenvManager::new(commands.clone(), registry));

        Self {
            config,
            commands,
            version,
            installer,
            venvs,
            pool: TaskPool::default(),
            events,
            locale: current_locale(),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn commands(&self) -> &RuyiCommands {
        &self.commands
    }

    pub fn venvs(&self) -> &Arc<VenvManager> {
        &self.venvs
    }

    fn emit(events: &EventSender, event: CoreEvent) {
        if events.send(event).is_err() {
            tracing::debug!("事件接收端已关闭");
        }
    }

    /// 启动时按设置自动检查版本
    pub fn startup(&self, cancel: CancellationToken) -> Option<Completion> {
        if !self.config.auto_check() {
            tracing::info!("已关闭启动时版本检查");
            return None;
        }
        Some(self.request_version_check(cancel))
    }

    /// 版本检查；已有检查进行中时不产生任何事件
    pub fn request_version_check(&self, cancel: CancellationToken) -> Completion {
        let engine = self.version.clone();
        let events = self.events.clone();
        self.pool.submit("version-check", async move {
            match engine.check(&cancel).await {
                Some(Ok(outcome)) => Self::emit(&events, CoreEvent::CheckCompleted { outcome }),
                Some(Err(e)) => {
                    Self::emit(&events, CoreEvent::from_error(Operation::VersionCheck, &e))
                }
                None => {}
            }
        })
    }

    pub fn request_install(&self, cancel: CancellationToken) -> Completion {
        let installer = self.installer.clone();
        let events = self.events.clone();
        self.pool.submit("install", async move {
            let listener = ChannelListener::new(events.clone());
            let event = match installer.install(&listener, &cancel).await {
                Ok(report) => CoreEvent::InstallCompleted {
                    version: report.release.version,
                    path: report.binary_path,
                },
                Err(e) => CoreEvent::from_error(Operation::Install, &e),
            };
            Self::emit(&events, event);
        })
    }

    /// 扫描项目目录和 ruyi 自己的 venv
    pub fn request_venv_scan(&self, roots: Vec<PathBuf>) -> Completion {
        let venvs = self.venvs.clone();
        let events = self.events.clone();
        self.pool.submit("venv-scan", async move {
            let event = scan_venvs(&venvs, roots).await;
            Self::emit(&events, event);
        })
    }

    pub fn request_venv_create(&self, request: VenvCreateRequest) -> Completion {
        let venvs = self.venvs.clone();
        let events = self.events.clone();
        self.pool.submit("venv-create", async move {
            let event = match venvs.create(&request).await {
                Ok(venv) => CoreEvent::VenvCreated { venv },
                Err(e) => CoreEvent::from_error(Operation::VenvCreate, &e),
            };
            Self::emit(&events, event);
        })
    }

    pub fn request_venv_delete(&self, paths: Vec<PathBuf>) -> Completion {
        let venvs = self.venvs.clone();
        let events = self.events.clone();
        self.pool.submit("venv-delete", async move {
            let event = match venvs.delete(paths).await {
                Ok(paths) => CoreEvent::VenvsDeleted { paths },
                Err(e) => CoreEvent::from_error(Operation::VenvDelete, &e),
            };
            Self::emit(&events, event);
        })
    }

    pub fn request_packages(&self, category: Option<String>) -> Completion {
        let commands = self.commands.clone();
        let events = self.events.clone();
        self.pool.submit("packages", async move {
            let event = match commands.list_packages(category.as_deref()).await {
                Ok(report) => CoreEvent::PackagesListed {
                    packages: report.records,
                    skipped: report.skipped,
                },
                Err(e) => CoreEvent::from_error(Operation::Packages, &e),
            };
            Self::emit(&events, event);
        })
    }

    pub fn request_news(&self) -> Completion {
        let commands = self.commands.clone();
        let events = self.events.clone();
        let locale = self.locale.clone();
        self.pool.submit("news", async move {
            let event = match commands.list_news(&locale).await {
                Ok(report) => CoreEvent::NewsListed {
                    items: report.records,
                    skipped: report.skipped,
                },
                Err(e) => CoreEvent::from_error(Operation::News, &e),
            };
            Self::emit(&events, event);
        })
    }

    pub fn request_profiles(&self) -> Completion {
        let commands = self.commands.clone();
        let events = self.events.clone();
        self.pool.submit("profiles", async move {
            let event = match commands.list_profiles().await {
                Ok(report) => CoreEvent::ProfilesListed {
                    profiles: report.records,
                },
                Err(e) => CoreEvent::from_error(Operation::Profiles, &e),
            };
            Self::emit(&events, event);
        })
    }

    /// 按配置的静默期启动工作区重扫调度器
    pub fn rescan_scheduler(&self, workspace: Arc<dyn WorkspaceProvider>) -> VenvRescanScheduler {
        VenvRescanScheduler::spawn(
            self.venvs.clone(),
            workspace,
            self.config.venv_rescan_delay(),
            self.events.clone(),
        )
    }
}
