//! 核心错误类型
//!
//! 所有后台操作最终都归结为一个 `AppError`，UI 层只需把 `Display` 结果
//! 展示给用户，`detail()` 给出可放进日志面板的附加内容。

use crate::data::DataError;
use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 环境错误：可执行文件缺失、目录不可用、磁盘空间不足等，不重试
    #[error("{0}")]
    Environment(String),

    /// 网络错误：已按顺序尝试过所有来源
    #[error("Network request failed after trying [{}]: {message}", sources.join(", "))]
    Network {
        sources: Vec<String>,
        message: String,
    },

    /// 子进程非零退出，完整输出原样保留
    #[error("`{step}` failed with exit code {exit_code}")]
    Subprocess {
        step: String,
        exit_code: i32,
        output: String,
    },

    /// 解析失败（仅用于整体无法解析的场景，单条记录的失败只计数）
    #[error("Parse error: {0}")]
    Parse(String),

    /// 当前平台不在发布元数据中
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// 用户取消
    #[error("Operation cancelled")]
    Cancelled,

    /// 配置读写失败
    #[error(transparent)]
    Config(#[from] DataError),

    /// 其他 I/O 错误
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn network(sources: Vec<String>, message: impl Into<String>) -> Self {
        Self::Network {
            sources,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 供详情面板使用的附加信息（子进程输出等）
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Subprocess { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_lists_sources() {
        let err = AppError::network(
            vec!["https://a".to_string(), "https://b".to_string()],
            "connection reset",
        );
        let msg = err.to_string();
        assert!(msg.contains("https://a, https://b"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_subprocess_detail_preserves_output() {
        let err = AppError::Subprocess {
            step: "ruyi update".to_string(),
            exit_code: 2,
            output: "fatal: repository not found".to_string(),
        };
        assert_eq!(err.detail(), Some("fatal: repository not found"));
        assert!(err.to_string().contains("ruyi update"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(AppError::Cancelled.is_cancelled());
        assert_eq!(AppError::Cancelled.detail(), None);
    }
}
