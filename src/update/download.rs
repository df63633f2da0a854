//! Streaming package download with manual redirect handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Response, Url};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::UpdateConfig;
use crate::error::{Classified, ErrorClass};

/// File name used when the URL has no usable last segment.
pub const DEFAULT_PACKAGE_NAME: &str = "update-package";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// One download attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination_path: PathBuf,
    pub status: DownloadStatus,
    pub bytes_total: Option<u64>,
    pub bytes_transferred: u64,
}

impl DownloadTask {
    fn new(source_url: &str, destination_path: PathBuf) -> Self {
        Self {
            source_url: source_url.to_string(),
            destination_path,
            status: DownloadStatus::Pending,
            bytes_total: None,
            bytes_transferred: 0,
        }
    }

    pub fn file_name(&self) -> String {
        self.destination_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Percentage complete, when the total size is known.
    pub fn percent(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => {
                Some(self.bytes_transferred as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }

    fn progress(&self, error: Option<String>) -> DownloadProgress {
        DownloadProgress {
            progress: self.percent(),
            status: self.status,
            file_name: self.file_name(),
            downloaded: self.bytes_transferred,
            total: self.bytes_total,
            error,
        }
    }
}

/// `download-progress` payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub progress: Option<f64>,
    pub status: DownloadStatus,
    pub file_name: String,
    pub downloaded: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download URL: {0}")]
    InvalidUrl(String),
    #[error("server responded with HTTP {0}")]
    HttpStatus(u16),
    #[error("redirect (HTTP {0}) without a Location header")]
    MissingLocation(u16),
    #[error("more than {0} redirects")]
    TooManyRedirects(u32),
    #[error("no response within {0} seconds")]
    RequestTimeout(u64),
    #[error("no data received for {0} seconds")]
    IdleTimeout(u64),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DownloadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl DownloadError {
    /// Message shown to the user in `update-status`.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => "更新地址无效".to_string(),
            Self::HttpStatus(code) => format!("下载失败，服务器返回 {code}"),
            Self::MissingLocation(_) | Self::TooManyRedirects(_) => {
                "下载失败，更新地址重定向异常".to_string()
            }
            Self::RequestTimeout(_) | Self::IdleTimeout(_) => "下载超时，请检查网络后重试".to_string(),
            Self::Request(_) => "下载失败，请检查网络连接".to_string(),
            Self::Io { .. } => "无法保存更新包".to_string(),
        }
    }
}

impl Classified for DownloadError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidUrl(_) => ErrorClass::Unexpected,
            _ => ErrorClass::Transfer,
        }
    }
}

/// Transfer limits and destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadOptions {
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_redirects: u32,
    pub download_dir: PathBuf,
}

impl DownloadOptions {
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_redirects: config.max_redirects,
            download_dir: std::env::temp_dir().join(&config.download_dir_name),
        }
    }
}

pub struct Downloader {
    client: Client,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(options: DownloadOptions) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(options.request_timeout)
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Download `url` to a fresh file under the download directory.
    ///
    /// `on_progress` sees every chunk in arrival order and exactly one final
    /// event with status `Succeeded` or `Failed`. On failure the partial file
    /// is removed.
    pub async fn download<F>(&self, url: &str, mut on_progress: F) -> Result<DownloadTask, DownloadError>
    where
        F: FnMut(DownloadProgress),
    {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                let error = DownloadError::InvalidUrl(format!("{url}: {e}"));
                on_progress(DownloadProgress {
                    progress: None,
                    status: DownloadStatus::Failed,
                    file_name: String::new(),
                    downloaded: 0,
                    total: None,
                    error: Some(error.to_string()),
                });
                return Err(error);
            }
        };
        // Provisional name for failures before the final URL is known.
        let destination = self.destination_for(&package_file_name(&parsed));
        let mut task = DownloadTask::new(url, destination);

        match self.transfer(parsed, &mut task, &mut on_progress).await {
            Ok(()) => {
                task.status = DownloadStatus::Succeeded;
                log::info!(
                    "Downloaded {} bytes to {}",
                    task.bytes_transferred,
                    task.destination_path.display()
                );
                on_progress(task.progress(None));
                Ok(task)
            }
            Err(e) => {
                task.status = DownloadStatus::Failed;
                discard_partial(&task.destination_path).await;
                on_progress(task.progress(Some(e.to_string())));
                Err(e)
            }
        }
    }

    fn destination_for(&self, file_name: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
        self.options
            .download_dir
            .join(format!("{stamp}-{file_name}"))
    }

    async fn transfer<F>(&self, url: Url, task: &mut DownloadTask, on_progress: &mut F) -> Result<(), DownloadError>
    where
        F: FnMut(DownloadProgress),
    {
        let response = self.fetch(url).await?;
        // Name the package after the URL the redirects landed on.
        task.destination_path = self.destination_for(&package_file_name(response.url()));
        task.bytes_total = response.content_length();

        let path = task.destination_path.clone();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| DownloadError::io(dir, e))?;
        }
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| DownloadError::io(&path, e))?;
        task.status = DownloadStatus::InProgress;

        let idle = self.options.idle_timeout;
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(idle, stream.next())
                .await
                .map_err(|_| DownloadError::IdleTimeout(idle.as_secs()))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(&path, e))?;
            task.bytes_transferred += chunk.len() as u64;
            on_progress(task.progress(None));
        }

        file.flush().await.map_err(|e| DownloadError::io(&path, e))?;
        Ok(())
    }

    /// GET `url`, following redirects by hand until a 2xx arrives.
    async fn fetch(&self, mut url: Url) -> Result<Response, DownloadError> {
        let request_timeout = self.options.request_timeout;
        let mut hops = 0;

        loop {
            let response = tokio::time::timeout(request_timeout, self.client.get(url.clone()).send())
                .await
                .map_err(|_| DownloadError::RequestTimeout(request_timeout.as_secs()))??;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                // Dropping the response aborts the previous request.
                drop(response);

                let Some(location) = location else {
                    return Err(DownloadError::MissingLocation(status.as_u16()));
                };
                if hops >= self.options.max_redirects {
                    return Err(DownloadError::TooManyRedirects(self.options.max_redirects));
                }
                hops += 1;

                let next = url
                    .join(&location)
                    .map_err(|e| DownloadError::InvalidUrl(format!("{location}: {e}")))?;
                log::info!("Redirect {} ({}) to {}", hops, status.as_u16(), next);
                url = next;
                continue;
            }

            if !status.is_success() {
                return Err(DownloadError::HttpStatus(status.as_u16()));
            }
            return Ok(response);
        }
    }
}

/// Last path segment of `url`, reduced to a safe file name.
pub fn package_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('.').is_empty() {
        DEFAULT_PACKAGE_NAME.to_string()
    } else {
        sanitized
    }
}

async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => log::info!("Removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove partial download {}: {}", path.display(), e),
    }
}
