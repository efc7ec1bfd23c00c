// 无界面驱动：在终端里调用核心操作，把事件以 JSON 打印到标准输出

use anyhow::{bail, Context, Result};
use ruyisdk_manager::services::manager::Completion;
use ruyisdk_manager::{
    event_channel, init_logger, ConfigStore, CoreEvent, EventReceiver, LogConfig, RuyiManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: ruyisdk-manager <check|install|packages [category]|news|profiles|venvs <root>...>";

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logger(&LogConfig::default())?;

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        bail!(USAGE);
    };
    let rest: Vec<String> = args.collect();

    let config = Arc::new(ConfigStore::open_default().context("failed to open settings")?);
    let (events, mut receiver) = event_channel();
    let manager = RuyiManager::new(config, events)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("收到中断信号，正在取消");
            ctrl_c.cancel();
        }
    });

    let completion = match command.as_str() {
        "check" => manager.request_version_check(cancel),
        "install" => manager.request_install(cancel),
        "packages" => manager.request_packages(rest.into_iter().next()),
        "news" => manager.request_news(),
        "profiles" => manager.request_profiles(),
        "venvs" => manager.request_venv_scan(rest.into_iter().map(PathBuf::from).collect()),
        other => bail!("unknown command `{other}`\n{USAGE}"),
    };

    pump(completion, &mut receiver).await
}

/// 打印事件直到操作结束，再把剩余事件清空
async fn pump(mut completion: Completion, receiver: &mut EventReceiver) -> Result<()> {
    loop {
        tokio::select! {
            _ = &mut completion => break,
            Some(event) = receiver.recv() => print_event(&event)?,
        }
    }
    while let Ok(event) = receiver.try_recv() {
        print_event(&event)?;
    }
    Ok(())
}

fn print_event(event: &CoreEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
