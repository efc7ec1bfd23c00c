// 服务层模块
//
// - config_store: 持久化设置
// - cli: ruyi 子进程桥与输出解析
// - release / version: 发布元数据与版本检查
// - installer: 下载安装 ruyi
// - venv: 虚拟环境发现与管理
// - worker / events / workspace / manager: 后台任务、事件与组装入口

pub mod cli;
pub mod config_store;
pub mod events;
pub mod installer;
pub mod manager;
pub mod release;
pub mod venv;
pub mod version;
pub mod worker;
pub mod workspace;

pub use cli::{CliBridge, ParseReport, RuyiCommands, ToolRunner};
pub use config_store::ConfigStore;
pub use events::{event_channel, CoreEvent, EventReceiver, EventSender, Operation};
pub use installer::{InstallListener, Installer};
pub use manager::RuyiManager;
pub use release::{ReleaseClient, ReleaseSource};
pub use venv::VenvManager;
pub use version::VersionCheckEngine;
pub use worker::TaskPool;
pub use workspace::{VenvRescanScheduler, WorkspaceProvider, WorkspaceSignal};
