// lib.rs - RuyiSDK IDE 核心：管理外部 ruyi 工具
//
// 界面层通过 `RuyiManager` 提交请求，从事件通道接收结果。

pub mod core;
pub mod data;
pub mod models;
pub mod services;
pub mod utils;

pub use models::*;
pub use services::{
    event_channel, CliBridge, ConfigStore, CoreEvent, EventReceiver, EventSender, Installer,
    Operation, ParseReport, RuyiCommands, RuyiManager, TaskPool, ToolRunner, VenvManager,
    VenvRescanScheduler, VersionCheckEngine, WorkspaceProvider, WorkspaceSignal,
};

pub use self::core::{
    init_logger, update_log_level, AppError, AppResult, LogConfig, LogFormat, LogGuard, LogLevel,
    LogOutput,
};
