//! 文件操作辅助函数：剩余空间检查、可执行权限

use std::fs;
use std::io;
use std::path::Path;

pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// 目录所在文件系统上当前用户可用的空间（字节）
pub fn available_space(dir: &Path) -> io::Result<u64> {
    fs2::available_space(dir)
}

/// 标记文件为可执行
///
/// 先尝试在现有权限上加执行位，失败时直接设置 0o755。
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let primary = fs::metadata(path).and_then(|metadata| {
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o100);
        fs::set_permissions(path, perms)
    });

    match primary {
        Ok(()) if is_executable(path) => Ok(()),
        other => {
            if let Err(e) = &other {
                tracing::debug!(path = %path.display(), error = ?e, "设置所有者执行位失败，改用 0o755");
            }
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
            if is_executable(path) {
                Ok(())
            } else {
                Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{} is still not executable", path.display()),
                ))
            }
        }
    }
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> io::Result<()> {
    fs::metadata(path).map(|_| ())
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
