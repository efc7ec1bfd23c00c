//! 平台信息：规范化架构名并生成发布元数据使用的平台键

/// 规范化 CPU 架构名
///
/// x86_64/amd64 → amd64，aarch64/arm64 → arm64，riscv* → riscv64，其余 unknown
pub fn normalize_arch(arch: &str) -> &'static str {
    let arch = arch.trim().to_ascii_lowercase();
    match arch.as_str() {
        "x86_64" | "amd64" | "x64" => "amd64",
        "aarch64" | "arm64" => "arm64",
        a if a.starts_with("riscv") => "riscv64",
        _ => "unknown",
    }
}

/// 当前平台信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: normalize_arch(std::env::consts::ARCH).to_string(),
        }
    }

    /// 发布元数据中的平台键，如 `linux/amd64`
    pub fn platform_key(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }
}
