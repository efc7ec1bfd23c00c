use super::package::PackageAtom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 已发现或新建的虚拟环境
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VenvRecord {
    pub path: PathBuf,
    pub profile: String,
    pub sysroot: String,
    /// 所属项目路径，独立 venv 为空
    pub project_path: Option<PathBuf>,
    /// 工具链 bin 目录，未找到 `*-gcc` 时为空
    pub toolchain_bin_path: Option<PathBuf>,
    /// 工具链前缀，如 `riscv64-plct-linux-gnu`
    pub toolchain_prefix: Option<String>,
}

/// 创建 venv 的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenvCreateRequest {
    pub toolchain: PackageAtom,
    pub emulator: Option<PackageAtom>,
    pub profile: String,
    pub path: PathBuf,
}
