//! Update pipeline: download the package, close every window, hand the
//! artifact to the OS.

mod download;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tauri::AppHandle;
use tauri_plugin_opener::OpenerExt;

pub use download::{
    package_file_name, DownloadError, DownloadOptions, DownloadProgress, DownloadStatus,
    DownloadTask, Downloader, DEFAULT_PACKAGE_NAME,
};

use crate::error;
use crate::window::{TauriWindows, WindowManager};

/// Shell side effects of an update.
pub trait UpdateHost {
    /// Destroy every application window; returns how many were closed.
    fn close_all_windows(&self) -> usize;
    /// Ask the OS to open `path` with its default handler.
    fn open_file(&self, path: &Path) -> Result<(), String>;
}

/// `update-status` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UpdateStatus {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Hand the downloaded artifact to the OS. Returns whether the OS accepted it.
pub fn install<H: UpdateHost + ?Sized>(host: &H, path: &Path) -> bool {
    match host.open_file(path) {
        Ok(()) => {
            log::info!("Launched installer {}", path.display());
            true
        }
        Err(reason) => {
            log::error!("Failed to open installer {}: {}", path.display(), reason);
            false
        }
    }
}

/// Held while an update runs; a second attempt is refused.
pub struct UpdateSlot<'a> {
    busy: &'a AtomicBool,
}

impl Drop for UpdateSlot<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct UpdatePipeline {
    options: DownloadOptions,
    busy: AtomicBool,
}

impl UpdatePipeline {
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            options,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the pipeline, or `None` if an update is already running.
    pub fn try_begin(&self) -> Option<UpdateSlot<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| UpdateSlot { busy: &self.busy })
    }

    /// Download, close all windows, then launch the package.
    ///
    /// Always resolves to a status; transfer errors are reported here.
    pub async fn perform_update<H, F>(
        &self,
        host: &H,
        version: Option<&str>,
        url: &str,
        on_progress: F,
    ) -> UpdateStatus
    where
        H: UpdateHost + ?Sized,
        F: FnMut(DownloadProgress),
    {
        let Some(_slot) = self.try_begin() else {
            log::warn!("Update requested while another is running");
            return UpdateStatus::failed("已有更新正在进行");
        };

        log::info!(
            "Starting update {} from {}",
            version.unwrap_or("(unversioned)"),
            url
        );

        let downloader = match Downloader::new(self.options.clone()) {
            Ok(downloader) => downloader,
            Err(e) => {
                error::report("update client", &e);
                return UpdateStatus::failed(e.user_message());
            }
        };

        let task = match downloader.download(url, on_progress).await {
            Ok(task) => task,
            Err(e) => {
                error::report("update download", &e);
                return UpdateStatus::failed(e.user_message());
            }
        };

        host.close_all_windows();

        if install(host, &task.destination_path) {
            UpdateStatus::succeeded("更新包已下载，正在启动安装程序")
        } else {
            UpdateStatus::failed("无法启动安装程序")
        }
    }
}

/// Tauri implementation of [`UpdateHost`].
pub struct TauriUpdateHost<'a> {
    app: AppHandle,
    windows: &'a WindowManager,
}

impl<'a> TauriUpdateHost<'a> {
    pub fn new(app: AppHandle, windows: &'a WindowManager) -> Self {
        Self { app, windows }
    }
}

impl UpdateHost for TauriUpdateHost<'_> {
    fn close_all_windows(&self) -> usize {
        self.windows
            .close_all(&TauriWindows::new(self.app.clone()))
    }

    fn open_file(&self, path: &Path) -> Result<(), String> {
        self.app
            .opener()
            .open_path(path.to_string_lossy(), None::<&str>)
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockUpdateHost {
        fail_open: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockUpdateHost {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock poisoned").clone()
        }
    }

    impl UpdateHost for MockUpdateHost {
        fn close_all_windows(&self) -> usize {
            self.calls
                .lock()
                .expect("calls lock poisoned")
                .push("close_all_windows".to_string());
            2
        }

        fn open_file(&self, path: &Path) -> Result<(), String> {
            self.calls
                .lock()
                .expect("calls lock poisoned")
                .push(format!("open:{}", path.display()));
            if self.fail_open {
                return Err("no handler".to_string());
            }
            Ok(())
        }
    }

    fn pipeline() -> UpdatePipeline {
        UpdatePipeline::new(DownloadOptions::from_config(&UpdateConfig::default()))
    }

    #[test]
    fn install_reports_os_refusal() {
        let host = MockUpdateHost {
            fail_open: true,
            ..Default::default()
        };

        assert!(!install(&host, Path::new("/tmp/setup.exe")));
        assert_eq!(host.calls(), vec!["open:/tmp/setup.exe".to_string()]);
    }

    #[test]
    fn slot_is_exclusive_and_released_on_drop() {
        let pipeline = pipeline();

        let slot = pipeline.try_begin().expect("first claim succeeds");
        assert!(pipeline.is_busy());
        assert!(pipeline.try_begin().is_none());

        drop(slot);
        assert!(!pipeline.is_busy());
        assert!(pipeline.try_begin().is_some());
    }

    #[tokio::test]
    async fn concurrent_update_is_refused_without_side_effects() {
        let pipeline = pipeline();
        let host = MockUpdateHost::default();
        let _running = pipeline.try_begin();
        let mut events = Vec::new();

        let status = pipeline
            .perform_update(&host, Some("2.0.0"), "https://dl.example.com/a.exe", |p| {
                events.push(p)
            })
            .await;

        assert!(!status.success);
        assert!(events.is_empty());
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_url_fails_with_final_progress_event() {
        let pipeline = pipeline();
        let host = MockUpdateHost::default();
        let mut events = Vec::new();

        let status = pipeline
            .perform_update(&host, None, "not a url", |p| events.push(p))
            .await;

        assert_eq!(status, UpdateStatus::failed("更新地址无效"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, DownloadStatus::Failed);
        assert!(host.calls().is_empty());
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn status_wire_shape() {
        assert_eq!(
            serde_json::to_value(UpdateStatus {
                success: true,
                message: None
            })
            .unwrap(),
            serde_json::json!({ "success": true })
        );
    }
}
