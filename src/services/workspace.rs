// 工作区变化后的 venv 重扫
//
// 宿主只需提供项目根目录列表和一个"有变化"的信号；
// 一串连续信号在静默期结束后合并为一次扫描。

use crate::services::events::{CoreEvent, EventSender, Operation};
use crate::services::venv::VenvManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 宿主工作区
pub trait WorkspaceProvider: Send + Sync {
    /// 当前打开的项目根目录
    fn project_roots(&self) -> Vec<PathBuf>;
}

/// 固定目录列表，供命令行和测试使用
pub struct StaticWorkspace(pub Vec<PathBuf>);

impl WorkspaceProvider for StaticWorkspace {
    fn project_roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// 工作区变化信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceSignal {
    pub has_open_projects: bool,
}

/// 扫描两个来源并生成事件；没有打开的项目时只扫描 ruyi 自己的 venv
pub async fn scan_venvs(venvs: &VenvManager, roots: Vec<PathBuf>) -> CoreEvent {
    let project = if roots.is_empty() {
        Ok(Vec::new())
    } else {
        venvs.discover_in_projects(roots).await
    };
    let registry = venvs.discover_registry().await;

    match (project, registry) {
        (Ok(project), Ok(registry)) => CoreEvent::VenvsDiscovered { project, registry },
        (Err(e), _) | (_, Err(e)) => CoreEvent::from_error(Operation::VenvScan, &e),
    }
}

/// 防抖后的 venv 重扫调度器，drop 时停止
pub struct VenvRescanScheduler {
    signals: mpsc::UnboundedSender<WorkspaceSignal>,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl VenvRescanScheduler {
    pub fn spawn(
        venvs: Arc<VenvManager>,
        workspace: Arc<dyn WorkspaceProvider>,
        delay: Duration,
        events: EventSender,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkspaceSignal>();
        let stop = CancellationToken::new();
        let stop_token = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                let mut latest = tokio::select! {
                    _ = stop_token.cancelled() => break,
                    signal = rx.recv() => match signal {
                        Some(signal) => signal,
                        None => break,
                    },
                };

                // 静默期内的新信号只更新状态并重新计时
                loop {
                    tokio::select! {
                        _ = stop_token.cancelled() => return,
                        _ = tokio::time::sleep(delay) => break,
                        signal = rx.recv() => match signal {
                            Some(signal) => latest = signal,
                            None => break,
                        },
                    }
                }

                let roots = if latest.has_open_projects {
                    workspace.project_roots()
                } else {
                    Vec::new()
                };
                tracing::debug!(roots = roots.len(), "工作区变化，重新扫描 venv");
                let event = scan_venvs(&venvs, roots).await;
                if events.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("venv 重扫调度器已停止");
        });

        Self {
            signals: tx,
            stop,
            handle: Some(handle),
        }
    }

    /// 通知工作区发生了变化
    pub fn notify(&self, signal: WorkspaceSignal) {
        let _ = self.signals.send(signal);
    }

    /// 停止并等待后台任务退出
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for VenvRescanScheduler {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
