// ruyi 子进程桥
//
// 所有对 ruyi 的调用都经过 `ToolRunner`，失败以 `RunResult` 的形式返回而不是错误，
// 方便后台任务直接把输出展示给用户。

use crate::models::RunResult;
use crate::services::config_store::ConfigStore;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// ruyi 可执行文件名
pub const TOOL_BINARY: &str = "ruyi";

/// 运行 ruyi 的抽象，测试中用脚本化的实现替代
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// 带额外环境变量运行
    async fn run_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> RunResult;

    async fn run(&self, args: &[&str]) -> RunResult {
        self.run_with_env(args, &[]).await
    }
}

/// 通过配置中的安装目录定位并启动 ruyi
pub struct CliBridge {
    config: Arc<ConfigStore>,
    timeout: Option<Duration>,
}

impl CliBridge {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            timeout: None,
        }
    }

    /// 单次调用的超时，超时后子进程被杀掉
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `<installDir>/ruyi`，安装目录未配置时为 None
    pub fn executable(&self) -> Option<PathBuf> {
        self.config
            .install_path()
            .map(|dir| dir.join(TOOL_BINARY))
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 按行把一个管道的内容追加到共享缓冲区
async fn pump_lines<R>(reader: Option<R>, sink: &Mutex<Vec<u8>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(&line);
    }
}

/// 同时读取 stdout 和 stderr，按行到达的先后合并，并等待进程退出
async fn collect_output(mut child: Child) -> std::io::Result<(ExitStatus, String)> {
    let sink = Mutex::new(Vec::new());
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (out, err, status) = tokio::join!(
        pump_lines(stdout, &sink),
        pump_lines(stderr, &sink),
        child.wait()
    );
    out?;
    err?;
    let status = status?;

    let bytes = sink.into_inner().unwrap_or_else(|e| e.into_inner());
    Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
}

#[async_trait]
impl ToolRunner for CliBridge {
    async fn run_with_env(&self, args: &[&str], envs: &[(&str, &str)]) -> RunResult {
        let Some(exe) = self.executable() else {
            return RunResult::failure(format!(
                "ruyi install path is not configured; cannot run `{}`",
                command_line(TOOL_BINARY, args)
            ));
        };
        let cmdline = command_line(&exe.to_string_lossy(), args);
        tracing::debug!(command = %cmdline, "执行 ruyi 命令");

        let mut cmd = Command::new(&exe);
        cmd.args(args)
            .envs(envs.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %cmdline, error = ?e, "无法启动 ruyi");
                return RunResult::failure(format!("Failed to execute `{cmdline}`: {e}"));
            }
        };

        // 超时后 child 随 future 一起被 drop，kill_on_drop 负责杀掉进程
        let collected = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, collect_output(child)).await {
                Ok(collected) => collected,
                Err(_) => {
                    tracing::warn!(command = %cmdline, timeout_secs = timeout.as_secs_f64(), "ruyi 命令超时");
                    return RunResult::failure(format!(
                        "Timed out after {:.1}s: {cmdline}",
                        timeout.as_secs_f64()
                    ));
                }
            },
            None => collect_output(child).await,
        };

        match collected {
            Ok((status, output)) => {
                let exit_code = status.code().unwrap_or(-1);
                if exit_code != 0 {
                    tracing::debug!(command = %cmdline, exit_code, "ruyi 命令返回非零");
                }
                RunResult::new(exit_code, output)
            }
            Err(e) => {
                tracing::warn!(command = %cmdline, error = ?e, "读取 ruyi 输出失败");
                RunResult::failure(format!("Failed to read output of `{cmdline}`: {e}"))
            }
        }
    }
}
