//! 数据层错误类型
//!
//! 使用 `thiserror` 定义配置文件读写的错误，携带出错的文件路径。

use std::path::PathBuf;
use thiserror::Error;

/// 数据层统一错误类型
#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 既没有 XDG_CONFIG_HOME 也没有 HOME
    #[error("cannot determine the settings directory: {0}")]
    NoConfigDir(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
