// ruyi 子命令封装
//
// 把命令行拼装和输出解析集中在一处，上层服务只和类型化的结果打交道。

use super::bridge::{ToolRunner, TOOL_BINARY};
use super::porcelain::{self, ParseReport};
use crate::core::error::AppResult;
use crate::models::{
    NewsItem, PackageAtom, PackageRecord, ProfileRecord, RunResult, TelemetryMode, ToolVersion,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

const PORCELAIN: &str = "--porcelain";
const EXPERIMENTAL_ENV: (&str, &str) = ("RUYI_EXPERIMENTAL", "x");

/// `ruyi --version` 的第一行，如 `Ruyi 0.39.0`
static VERSION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\S+\s+([0-9]+\.[0-9]+\.[0-9]+)\s*$").expect("invalid version line regex")
});

/// 从 `--version` 输出中取出版本号，第一行不符合格式时返回 None
pub fn parse_version_output(output: &str) -> Option<ToolVersion> {
    let first = output.lines().next()?;
    let caps = VERSION_LINE.captures(first.trim_end())?;
    ToolVersion::parse(&caps[1])
}

fn step_name(args: &[&str]) -> String {
    std::iter::once(TOOL_BINARY)
        .chain(args.iter().copied().filter(|a| *a != PORCELAIN))
        .collect::<Vec<_>>()
        .join(" ")
}

/// ruyi 命令集合
#[derive(Clone)]
pub struct RuyiCommands {
    runner: Arc<dyn ToolRunner>,
}

impl RuyiCommands {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<dyn ToolRunner> {
        &self.runner
    }

    async fn checked(&self, args: &[&str]) -> AppResult<String> {
        self.runner.run(args).await.into_result(step_name(args))
    }

    /// `ruyi --version` 原始结果
    pub async fn version(&self) -> RunResult {
        self.runner.run(&["--version"]).await
    }

    /// 已安装的版本；未安装或输出无法识别时为 None
    pub async fn installed_version(&self) -> Option<ToolVersion> {
        let result = self.version().await;
        if !result.success() {
            tracing::debug!(exit_code = result.exit_code, "ruyi --version 失败");
            return None;
        }
        parse_version_output(&result.output)
    }

    /// `ruyi --porcelain list [--category-is <category>]`
    pub async fn list_packages(
        &self,
        category: Option<&str>,
    ) -> AppResult<ParseReport<PackageRecord>> {
        let mut args = vec![PORCELAIN, "list"];
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            args.extend(["--category-is", category]);
        }
        let output = self.checked(&args).await?;
        let report = porcelain::parse_package_list(&output);
        tracing::info!(
            parsed = report.records.len(),
            skipped = report.skipped,
            "软件包列表解析完成"
        );
        Ok(report)
    }

    /// `ruyi --porcelain news list`
    pub async fn list_news(&self, locale: &str) -> AppResult<ParseReport<NewsItem>> {
        let output = self.checked(&[PORCELAIN, "news", "list"]).await?;
        let report = porcelain::parse_news_list(&output, locale);
        tracing::info!(
            parsed = report.records.len(),
            skipped = report.skipped,
            "新闻列表解析完成"
        );
        Ok(report)
    }

    /// `ruyi news read <id>`，同时把该条标记为已读
    pub async fn read_news(&self, id: &str) -> AppResult<String> {
        self.checked(&["news", "read", id]).await
    }

    /// `ruyi list profiles`（实验性子命令）
    pub async fn list_profiles(&self) -> AppResult<ParseReport<ProfileRecord>> {
        let args = ["list", "profiles"];
        let output = self
            .runner
            .run_with_env(&args, &[EXPERIMENTAL_ENV])
            .await
            .into_result(step_name(&args))?;
        Ok(porcelain::parse_profiles(&output))
    }

    /// `ruyi install <name>(==<version>)`
    pub async fn install_package(&self, atom: &PackageAtom) -> AppResult<String> {
        let atom = atom.to_string();
        self.checked(&["install", &atom]).await
    }

    /// `ruyi config set repo.remote <url>`
    pub async fn set_repository_url(&self, url: &str) -> AppResult<String> {
        self.checked(&["config", "set", "repo.remote", url]).await
    }

    /// `ruyi update`
    pub async fn update_index(&self) -> AppResult<String> {
        self.checked(&["update"]).await
    }

    /// `ruyi telemetry consent|local|optout`
    pub async fn set_telemetry(&self, mode: TelemetryMode) -> AppResult<String> {
        self.checked(&["telemetry", mode.cli_verb()]).await
    }

    /// `ruyi venv -t <toolchain> [-e <emulator>] <profile> <path>`
    pub async fn create_venv(
        &self,
        toolchain: &PackageAtom,
        emulator: Option<&PackageAtom>,
        profile: &str,
        path: &Path,
    ) -> AppResult<String> {
        let toolchain = toolchain.to_string();
        let emulator = emulator.map(ToString::to_string);
        let path = path.to_string_lossy();

        let mut args = vec!["venv", "-t", toolchain.as_str()];
        if let Some(emulator) = emulator.as_deref() {
            args.extend(["-e", emulator]);
        }
        args.extend([profile, &*path]);
        self.checked(&args).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;
    use crate::core::error::AppError;

    fn commands(runner: &Arc<ScriptedRunner>) -> RuyiCommands {
        RuyiCommands::new(runner.clone())
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output("Ruyi 0.39.0\n\nRunning on linux/x86_64.\n"),
            Some(ToolVersion::new(0, 39, 0))
        );
        assert_eq!(parse_version_output("ruyi 1.2.3  \n"), Some(ToolVersion::new(1, 2, 3)));
        assert_eq!(parse_version_output("Ruyi 0.39.0-beta"), None);
        assert_eq!(parse_version_output("0.39.0"), None);
        assert_eq!(parse_version_output(""), None);
        assert_eq!(parse_version_output("usage: ruyi\nRuyi 1.0.0"), None);
    }

    #[tokio::test]
    async fn test_installed_version_ignores_failed_run() {
        let runner = ScriptedRunner::new([RunResult::new(1, "Ruyi 0.39.0")]);
        assert_eq!(commands(&runner).installed_version().await, None);
    }

    #[tokio::test]
    async fn test_list_packages_with_category() {
        let runner = ScriptedRunner::new([RunResult::new(
            0,
            r#"{"ty":"pkglistoutput-v1","category":"toolchain","name":"gnu-upstream","vers":[{"semver":"0.20231118.0"}]}"#,
        )]);
        let report = commands(&runner)
            .list_packages(Some("toolchain"))
            .await
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(
            runner.call_lines(),
            vec!["--porcelain list --category-is toolchain"]
        );
    }

    #[tokio::test]
    async fn test_list_failure_keeps_output() {
        let runner = ScriptedRunner::new([RunResult::new(2, "repo not synced")]);
        let err = commands(&runner).list_packages(None).await.unwrap_err();
        match err {
            AppError::Subprocess { step, output, .. } => {
                assert_eq!(step, "ruyi list");
                assert_eq!(output, "repo not synced");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_profiles_use_experimental_env() {
        let runner = ScriptedRunner::new([RunResult::new(0, "generic\n")]);
        let report = commands(&runner).list_profiles().await.unwrap();
        assert_eq!(report.records[0].name, "generic");
        assert_eq!(
            runner.envs.lock().unwrap()[0],
            vec![("RUYI_EXPERIMENTAL".to_string(), "x".to_string())]
        );
    }

    #[tokio::test]
    async fn test_command_lines() {
        let runner = ScriptedRunner::new((0..6).map(|_| RunResult::new(0, "")));
        let cmds = commands(&runner);
        let tc = PackageAtom::new("gnu-plct", Some("0.20240324.0"));
        let emu = PackageAtom::new("qemu-user-riscv-upstream", None::<String>);

        cmds.install_package(&tc).await.unwrap();
        cmds.set_repository_url("https://example.com/index.git")
            .await
            .unwrap();
        cmds.update_index().await.unwrap();
        cmds.set_telemetry(TelemetryMode::Local).await.unwrap();
        cmds.create_venv(&tc, Some(&emu), "generic", Path::new("/tmp/v"))
            .await
            .unwrap();
        cmds.read_news("2024-01-14-ruyi-news").await.unwrap();

        assert_eq!(
            runner.call_lines(),
            vec![
                "install gnu-plct(==0.20240324.0)",
                "config set repo.remote https://example.com/index.git",
                "update",
                "telemetry local",
                "venv -t gnu-plct(==0.20240324.0) -e qemu-user-riscv-upstream generic /tmp/v",
                "news read 2024-01-14-ruyi-news",
            ]
        );
    }
}
