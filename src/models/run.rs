use crate::core::error::AppError;
use serde::Serialize;

/// 一次子进程调用的结果
///
/// 非零退出时也保留完整输出，供错误面板展示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub exit_code: i32,
    /// stdout 与 stderr 合并后的输出
    pub output: String,
}

impl RunResult {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// 未能启动或等待子进程时的结果
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(-1, message)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// 非零退出转换为 `AppError::Subprocess`，`step` 标明是哪一步失败
    pub fn into_result(self, step: impl Into<String>) -> Result<String, AppError> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(AppError::Subprocess {
                step: step.into(),
                exit_code: self.exit_code,
                output: self.output,
            })
        }
    }

    pub fn first_line(&self) -> Option<&str> {
        self.output.lines().next()
    }
}
