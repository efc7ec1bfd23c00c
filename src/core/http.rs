use crate::core::error::{AppError, AppResult};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("ruyisdk-ide/", env!("CARGO_PKG_VERSION"));

/// 构建共享的 HTTP 客户端
///
/// 发布元数据查询与二进制下载共用同一个 Client。
/// 这里只设置连接超时：下载总时长由调用方的取消信号控制，
/// 慢速镜像上的大文件不应被整体超时截断。
pub fn build_http_client() -> AppResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AppError::Environment(format!("Failed to build HTTP client: {e}")))
}
