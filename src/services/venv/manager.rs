// venv 管理：发现、创建、删除

use super::discovery::{load_venv, scan_project_roots, RegistryScanner, ACTIVATE_SCRIPT};
use super::marker::MARKER_FILE;
use crate::core::error::{AppError, AppResult};
use crate::models::{VenvCreateRequest, VenvRecord};
use crate::services::cli::RuyiCommands;
use std::path::{Path, PathBuf};

/// venv 管理器
pub struct VenvManager {
    commands: RuyiCommands,
    registry: RegistryScanner,
}

impl VenvManager {
    pub fn new(commands: RuyiCommands, registry: RegistryScanner) -> Self {
        Self { commands, registry }
    }

    /// 扫描项目根目录下的 venv
    pub async fn discover_in_projects(&self, roots: Vec<PathBuf>) -> AppResult<Vec<VenvRecord>> {
        tokio::task::spawn_blocking(move || scan_project_roots(&roots))
            .await
            .map_err(|e| AppError::Environment(format!("venv scan task failed: {e}")))
    }

    /// 扫描 ruyi 自己创建的 venv
    pub async fn discover_registry(&self) -> AppResult<Vec<VenvRecord>> {
        let scanner = self.registry.clone();
        tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(|e| AppError::Environment(format!("venv scan task failed: {e}")))
    }

    /// 创建 venv：安装工具链 → 安装模拟器（可选）→ `ruyi venv`
    ///
    /// 任一步非零退出即停止，后续步骤不再执行。
    pub async fn create(&self, request: &VenvCreateRequest) -> AppResult<VenvRecord> {
        tracing::info!(
            toolchain = %request.toolchain,
            emulator = ?request.emulator.as_ref().map(ToString::to_string),
            profile = %request.profile,
            path = %request.path.display(),
            "创建 venv"
        );

        self.commands.install_package(&request.toolchain).await?;
        if let Some(emulator) = &request.emulator {
            self.commands.install_package(emulator).await?;
        }
        self.commands
            .create_venv(
                &request.toolchain,
                request.emulator.as_ref(),
                &request.profile,
                &request.path,
            )
            .await?;

        let path = request.path.clone();
        let mut record = tokio::task::spawn_blocking(move || load_venv(&path, None))
            .await
            .map_err(|e| AppError::Environment(format!("venv load task failed: {e}")))?;
        if record.profile.is_empty() {
            record.profile = request.profile.clone();
        }
        Ok(record)
    }

    /// 按给定顺序逐个删除
    ///
    /// 遇到第一个失败即停止；已删除的不回滚，错误中带出失败的路径。
    pub async fn delete(&self, paths: Vec<PathBuf>) -> AppResult<Vec<PathBuf>> {
        let mut deleted = Vec::with_capacity(paths.len());
        for path in paths {
            if !looks_like_venv(&path) {
                return Err(AppError::Environment(format!(
                    "{} is not a ruyi virtual environment ({} deleted before this one)",
                    path.display(),
                    deleted.len()
                )));
            }

            tokio::fs::remove_dir_all(&path).await.map_err(|e| {
                AppError::io(
                    format!(
                        "delete venv {} ({} deleted before this one)",
                        path.display(),
                        deleted.len()
                    ),
                    e,
                )
            })?;
            tracing::info!(path = %path.display(), "已删除 venv");
            deleted.push(path);
        }
        Ok(deleted)
    }
}

fn looks_like_venv(path: &Path) -> bool {
    path.is_dir() && (path.join(MARKER_FILE).is_file() || path.join(ACTIVATE_SCRIPT).is_file())
}
