//! 日志初始化
//!
//! 核心自身的日志和从 ruyi porcelain 输出转发的日志（target = `ruyi`）
//! 共用一个过滤器，级别可以在运行时通过 `update_log_level` 调整。

use crate::models::config::{LogConfig, LogFormat, LogLevel, LogOutput};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::{Layered, SubscriberExt},
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 滚动日志文件名前缀
const LOG_FILE_PREFIX: &str = "ruyisdk-manager.log";
/// 缓存目录下的子目录
const LOG_DIR_NAME: &str = "ruyisdk-ide";

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static>;

static FILTER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

/// 文件日志的后台写线程句柄，drop 时把缓冲区写完
#[must_use = "dropping the guard stops the file log writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// 按配置安装全局订阅者，进程内只能调用一次
///
/// `RUST_LOG` 存在时覆盖配置中的级别。返回的 `LogGuard` 需要保持到进程退出。
pub fn init_logger(config: &LogConfig) -> anyhow::Result<LogGuard> {
    let (filter_layer, handle) = reload::Layer::new(build_filter(&config.level));
    if FILTER_HANDLE.set(handle).is_err() {
        anyhow::bail!("logger is already initialised");
    }

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    if matches!(config.output, LogOutput::Console | LogOutput::Both) {
        layers.push(format_layer(&config.format, std::io::stderr, true));
    }
    let mut file_guard = None;
    let mut file_dir = None;
    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        let dir = resolve_log_dir(config.file_path.as_deref())?;
        let (writer, guard) = non_blocking(rolling::daily(&dir, LOG_FILE_PREFIX));
        layers.push(format_layer(&config.format, writer, false));
        file_guard = Some(guard);
        file_dir = Some(dir);
    }

    Registry::default()
        .with(filter_layer)
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    tracing::info!(
        level = config.level.as_str(),
        format = ?config.format,
        output = ?config.output,
        dir = ?file_dir,
        "日志已启用"
    );
    Ok(LogGuard { _file: file_guard })
}

/// 运行时切换日志级别
pub fn update_log_level(level: LogLevel) -> anyhow::Result<()> {
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("logger is not initialised"))?;
    handle
        .reload(build_filter(&level))
        .map_err(|e| anyhow::anyhow!("failed to reload log filter: {e}"))?;
    tracing::info!(level = level.as_str(), "日志级别已切换");
    Ok(())
}

fn build_filter(level: &LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(level)))
}

/// 本 crate 与 ruyi 转发日志使用配置级别，HTTP 栈只保留警告
fn filter_directives(level: &LogLevel) -> String {
    let level = level.as_str();
    format!("ruyisdk_manager={level},ruyi={level},reqwest=warn,hyper=warn,h2=warn")
}

fn format_layer<W>(format: &LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// 未指定时写到 `<cache>/ruyisdk-ide/logs`
fn resolve_log_dir(custom: Option<&str>) -> anyhow::Result<PathBuf> {
    let dir = match custom {
        Some(path) => PathBuf::from(path),
        None => dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .ok_or_else(|| anyhow::anyhow!("cannot determine a cache directory for logs"))?
            .join(LOG_DIR_NAME)
            .join("logs"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
