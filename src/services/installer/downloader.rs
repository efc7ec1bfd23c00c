// 二进制下载：流式写盘、进度回调、取消与多源回退

use crate::core::error::{AppError, AppResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// 进度回调：(已传输字节, 总字节)
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// 单个来源的下载实现，测试中可替换
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// 下载 `url` 到 `dest`，返回写入的字节数
    ///
    /// 被取消时返回 `AppError::Cancelled`。
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: ProgressFn<'_>,
    ) -> AppResult<u64>;
}

/// 基于 reqwest 的下载器
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: ProgressFn<'_>,
    ) -> AppResult<u64> {
        let net_err = |message: String| AppError::network(vec![url.to_string()], message);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            r = self.client.get(url).send() => r.map_err(|e| net_err(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(net_err(format!("HTTP {status}")));
        }

        let total = response.content_length();
        tracing::debug!(url, total_bytes = ?total, "开始下载");

        let mut file = File::create(dest)
            .await
            .map_err(|e| AppError::io(format!("create {}", dest.display()), e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        progress(0, total);

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => None,
                c = stream.next() => Some(c),
            };

            let Some(chunk) = chunk else {
                drop(file);
                remove_partial(dest).await;
                return Err(AppError::Cancelled);
            };

            match chunk {
                Some(Ok(bytes)) => {
                    file.write_all(&bytes)
                        .await
                        .map_err(|e| AppError::io(format!("write {}", dest.display()), e))?;
                    downloaded += bytes.len() as u64;
                    progress(downloaded, total);
                }
                Some(Err(e)) => return Err(net_err(e.to_string())),
                None => break,
            }
        }

        file.flush()
            .await
            .map_err(|e| AppError::io(format!("flush {}", dest.display()), e))?;

        if let Some(total) = total {
            if downloaded < total {
                return Err(net_err(format!(
                    "connection closed after {downloaded} of {total} bytes"
                )));
            }
        }

        Ok(downloaded)
    }
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => tracing::debug!(path = %dest.display(), "已删除未完成的下载"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dest.display(), error = ?e, "删除未完成的下载失败"),
    }
}

/// 下载过程中使用的临时文件：`<dest>.download`，与目标在同一目录
pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".download");
    dest.with_file_name(name)
}

/// 按顺序尝试每个来源，成功后把临时文件原子替换到 `dest`
///
/// 所有来源都写入 `staging_path(dest)`：非最后一个来源失败时删除临时文件再换下一个，
/// 最后一个来源失败时保留临时文件以便排查，取消时总是删除。`dest` 只在下载成功后被替换。
pub async fn download_with_fallback(
    fetcher: &dyn ArtifactFetcher,
    sources: &[String],
    dest: &Path,
    cancel: &CancellationToken,
    progress: ProgressFn<'_>,
    on_attempt: &(dyn Fn(usize, &str) + Send + Sync),
) -> AppResult<u64> {
    let staging = staging_path(dest);
    let mut last_error: Option<AppError> = None;

    for (index, url) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            remove_partial(&staging).await;
            return Err(AppError::Cancelled);
        }
        on_attempt(index, url);

        match fetcher.fetch(url, &staging, cancel, progress).await {
            Ok(bytes) => {
                tokio::fs::rename(&staging, dest).await.map_err(|e| {
                    AppError::io(
                        format!("move {} to {}", staging.display(), dest.display()),
                        e,
                    )
                })?;
                tracing::info!(url = %url, bytes, dest = %dest.display(), "下载完成");
                return Ok(bytes);
            }
            Err(AppError::Cancelled) => {
                remove_partial(&staging).await;
                return Err(AppError::Cancelled);
            }
            Err(e) => {
                let is_last = index + 1 == sources.len();
                tracing::warn!(url = %url, error = %e, is_last, "下载源失败");
                if !is_last {
                    remove_partial(&staging).await;
                }
                last_error = Some(e);
            }
        }
    }

    let message = match last_error {
        Some(AppError::Network { message, .. }) => message,
        Some(other) => other.to_string(),
        None => "no download source available".to_string(),
    };
    Err(AppError::network(sources.to_vec(), message))
}
