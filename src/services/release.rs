// 发布元数据客户端
//
// 查询 `<base>/releases/latest-pm`，取 stable 渠道中当前平台的版本和下载地址。

use crate::core::error::{AppError, AppResult};
use crate::core::http::build_http_client;
use crate::models::{ReleaseInfo, ToolVersion};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_API_BASE: &str = "https://api.ruyisdk.cn";
const LATEST_PM_PATH: &str = "/releases/latest-pm";
const STABLE_CHANNEL: &str = "stable";

/// 最新发布信息的来源，测试中可替换
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self, platform_key: &str) -> AppResult<ReleaseInfo>;
}

#[derive(Debug, Deserialize)]
struct LatestPmResponse {
    #[serde(default)]
    channels: HashMap<String, ChannelInfo>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    version: String,
    #[serde(default)]
    download_urls: HashMap<String, Vec<String>>,
}

/// 从响应体中取出指定平台的发布信息
pub fn parse_latest_release(body: &str, platform_key: &str) -> AppResult<ReleaseInfo> {
    let response: LatestPmResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("invalid release metadata: {e}")))?;

    let channel = response
        .channels
        .get(STABLE_CHANNEL)
        .ok_or_else(|| AppError::Parse("release metadata has no stable channel".to_string()))?;

    let version = ToolVersion::parse(channel.version.trim()).ok_or_else(|| {
        AppError::Parse(format!("invalid release version: {}", channel.version))
    })?;

    let urls = channel
        .download_urls
        .get(platform_key)
        .filter(|urls| urls.first().is_some_and(|u| !u.is_empty()))
        .ok_or_else(|| AppError::UnsupportedPlatform(platform_key.to_string()))?;

    let primary_url = urls[0].clone();
    let fallback_url = urls.get(1).cloned().unwrap_or_default();
    let filename = filename_from_url(&primary_url);

    Ok(ReleaseInfo {
        version,
        channel: STABLE_CHANNEL.to_string(),
        filename,
        primary_url,
        fallback_url,
    })
}

/// URL 的最后一段路径
fn filename_from_url(raw: &str) -> String {
    let from_parsed = url::Url::parse(raw).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });
    from_parsed
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            raw.rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or(raw)
                .to_string()
        })
}

/// HTTP 发布元数据客户端
pub struct ReleaseClient {
    client: Client,
    base_url: String,
}

impl ReleaseClient {
    pub fn new() -> AppResult<Self> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> AppResult<Self> {
        Ok(Self::with_client(build_http_client()?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, LATEST_PM_PATH)
    }
}

#[async_trait]
impl ReleaseSource for ReleaseClient {
    async fn latest_release(&self, platform_key: &str) -> AppResult<ReleaseInfo> {
        let endpoint = self.endpoint();
        tracing::debug!(url = %endpoint, platform = platform_key, "请求发布元数据");

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| AppError::network(vec![endpoint.clone()], e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(
                vec![endpoint],
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::network(vec![endpoint.clone()], e.to_string()))?;

        let info = parse_latest_release(&body, platform_key)?;
        tracing::info!(version = %info.version, file = %info.filename, "获取到最新发布");
        Ok(info)
    }
}
