// venv 发现
//
// 两个互相独立的来源：
// - 项目根目录的直接子目录中带 `ruyi-venv.toml` 的目录
// - 文件系统中带 `bin/ruyi-activate` 的目录（ruyi 自己创建的 venv）

use super::marker::{read_marker, MARKER_FILE};
use crate::models::VenvRecord;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// venv 激活脚本的相对路径
pub const ACTIVATE_SCRIPT: &str = "bin/ruyi-activate";

const GCC_SUFFIX: &str = "-gcc";
const DEFAULT_MAX_DEPTH: usize = 4;
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "__pycache__"];

/// 工具链身份：bin 目录与前缀
pub fn detect_toolchain(venv_dir: &Path) -> (Option<PathBuf>, Option<String>) {
    let bin_dir = venv_dir.join("bin");
    let Ok(entries) = fs::read_dir(&bin_dir) else {
        return (None, None);
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.len() > GCC_SUFFIX.len() && name.ends_with(GCC_SUFFIX))
        .collect();
    names.sort();

    match names.first().and_then(|n| n.strip_suffix(GCC_SUFFIX)) {
        Some(prefix) => (Some(bin_dir), Some(prefix.to_string())),
        None => (None, None),
    }
}

/// 读取一个 venv 目录，生成记录
pub fn load_venv(venv_dir: &Path, project: Option<&Path>) -> VenvRecord {
    let marker = read_marker(venv_dir).unwrap_or_default();
    let (toolchain_bin_path, toolchain_prefix) = detect_toolchain(venv_dir);
    VenvRecord {
        path: venv_dir.to_path_buf(),
        profile: marker.profile.unwrap_or_default(),
        sysroot: marker.sysroot.unwrap_or_default(),
        project_path: project.map(Path::to_path_buf),
        toolchain_bin_path,
        toolchain_prefix,
    }
}

/// 扫描项目根目录的直接子目录
pub fn scan_project_roots(roots: &[PathBuf]) -> Vec<VenvRecord> {
    let mut found = Vec::new();
    for root in roots {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(root = %root.display(), error = ?e, "无法读取项目目录");
                continue;
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join(MARKER_FILE).is_file())
            .collect();
        dirs.sort();

        found.extend(dirs.iter().map(|dir| load_venv(dir, Some(root))));
    }
    tracing::debug!(roots = roots.len(), count = found.len(), "项目 venv 扫描完成");
    found
}

fn is_venv_dir(dir: &Path) -> bool {
    dir.join(ACTIVATE_SCRIPT).is_file()
}

/// ruyi venv 的文件系统扫描
#[derive(Debug, Clone)]
pub struct RegistryScanner {
    roots: Vec<PathBuf>,
    max_depth: usize,
}

impl RegistryScanner {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 默认从用户主目录开始扫描
    pub fn default_roots() -> Self {
        Self::new(dirs::home_dir().into_iter().collect())
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// 查找所有带激活脚本的目录，不进入 venv 内部和隐藏目录
    pub fn scan(&self) -> Vec<VenvRecord> {
        let mut found = Vec::new();
        for root in &self.roots {
            let mut walker = WalkDir::new(root)
                .max_depth(self.max_depth)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter();

            while let Some(entry) = walker.next() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::trace!(error = %e, "跳过不可访问的路径");
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy();
                if entry.depth() > 0
                    && (name.starts_with('.') || SKIPPED_DIRS.contains(&&*name))
                {
                    walker.skip_current_dir();
                    continue;
                }

                if is_venv_dir(entry.path()) {
                    found.push(load_venv(entry.path(), None));
                    walker.skip_current_dir();
                }
            }
        }
        tracing::debug!(count = found.len(), "ruyi venv 扫描完成");
        found
    }
}
