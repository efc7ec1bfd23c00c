// 核心事件
//
// 后台操作的进度与结果统一以 `CoreEvent` 发往界面层，核心不持有任何监听器注册表。

use crate::core::error::AppError;
use crate::models::{CheckOutcome, NewsItem, PackageRecord, ProfileRecord, ToolVersion, VenvRecord};
use crate::services::installer::InstallListener;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<CoreEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<CoreEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// 后台操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    VersionCheck,
    Install,
    VenvScan,
    VenvCreate,
    VenvDelete,
    Packages,
    News,
    Profiles,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::VersionCheck => "version check",
            Operation::Install => "install",
            Operation::VenvScan => "venv scan",
            Operation::VenvCreate => "venv creation",
            Operation::VenvDelete => "venv deletion",
            Operation::Packages => "package listing",
            Operation::News => "news listing",
            Operation::Profiles => "profile listing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    CheckCompleted {
        outcome: CheckOutcome,
    },
    InstallProgress {
        percent: u8,
        message: String,
    },
    InstallLog {
        message: String,
    },
    InstallCompleted {
        version: ToolVersion,
        path: PathBuf,
    },
    /// 两个来源分开给出，由界面层合并
    VenvsDiscovered {
        project: Vec<VenvRecord>,
        registry: Vec<VenvRecord>,
    },
    VenvCreated {
        venv: VenvRecord,
    },
    VenvsDeleted {
        paths: Vec<PathBuf>,
    },
    PackagesListed {
        packages: Vec<PackageRecord>,
        skipped: usize,
    },
    NewsListed {
        items: Vec<NewsItem>,
        skipped: usize,
    },
    ProfilesListed {
        profiles: Vec<ProfileRecord>,
    },
    Failed {
        operation: Operation,
        message: String,
        detail: Option<String>,
    },
    Cancelled {
        operation: Operation,
    },
}

impl CoreEvent {
    /// 把错误转换为失败或取消事件
    pub fn from_error(operation: Operation, error: &AppError) -> Self {
        if error.is_cancelled() {
            return CoreEvent::Cancelled { operation };
        }
        CoreEvent::Failed {
            operation,
            message: error.to_string(),
            detail: error.detail().map(str::to_string),
        }
    }
}

/// 通过事件通道上报的安装监听器
pub struct ChannelListener {
    sender: EventSender,
}

impl ChannelListener {
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl InstallListener for ChannelListener {
    fn progress_changed(&self, percent: u8, message: &str) {
        let _ = self.sender.send(CoreEvent::InstallProgress {
            percent,
            message: message.to_string(),
        });
    }

    fn log_message(&self, message: &str) {
        let _ = self.sender.send(CoreEvent::InstallLog {
            message: message.to_string(),
        });
    }
}
