// ruyi 命令行交互：子进程桥、命令封装与 porcelain 解析

pub mod bridge;
pub mod commands;
pub mod porcelain;

pub use bridge::{CliBridge, ToolRunner, TOOL_BINARY};
pub use commands::{parse_version_output, RuyiCommands};
pub use porcelain::{current_locale, ParseReport};
