//! Main window lifecycle.
//!
//! This module provides:
//! - Creation with a degrading content plan (dev server or app entry, local file, blank)
//! - Hide-on-close unless the process is quitting
//! - Idempotent activation and tray toggling
//! - A Tauri backend behind the [`MainWindowBackend`] trait

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tauri::{AppHandle, Manager, Url, WebviewUrl, WebviewWindowBuilder};
use thiserror::Error;

use crate::config::WindowConfig;
use crate::error::{self, Classified, ErrorClass};
use crate::icon::{self, IconLocations};
use crate::state::{MainWindowPhase, ProcessState, WindowRole};

pub const MAIN_WINDOW_LABEL: &str = "main";

/// Entry document served from the embedded frontend assets.
pub const APP_ENTRY: &str = "index.html";

/// Environment variable naming a dev server URL (debug builds only).
pub const DEV_SERVER_ENV: &str = "DEV_SERVER_URL";

/// One way of filling the main window with content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    DevServer(String),
    AppEntry(String),
    LocalFile(PathBuf),
    Blank,
}

impl std::fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DevServer(url) => write!(f, "dev server {url}"),
            Self::AppEntry(path) => write!(f, "app entry {path}"),
            Self::LocalFile(path) => write!(f, "local file {}", path.display()),
            Self::Blank => f.write_str("blank page"),
        }
    }
}

/// Where main window content may come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSources {
    pub dev_server_url: Option<String>,
    pub app_entry: Option<String>,
    pub local_files: Vec<PathBuf>,
}

impl ContentSources {
    /// Sources for the running process.
    pub fn from_environment(resource_dir: Option<&Path>) -> Self {
        let dev_server_url = if cfg!(debug_assertions) {
            std::env::var(DEV_SERVER_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
        } else {
            None
        };

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let local_files = [exe_dir.as_deref(), resource_dir]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(APP_ENTRY))
            .collect();

        Self {
            dev_server_url,
            app_entry: Some(APP_ENTRY.to_string()),
            local_files,
        }
    }

    /// Ordered load attempts; always ends with [`LoadTarget::Blank`].
    pub fn load_plan(&self) -> Vec<LoadTarget> {
        let mut plan = Vec::new();
        if let Some(url) = &self.dev_server_url {
            plan.push(LoadTarget::DevServer(url.clone()));
        } else if let Some(entry) = &self.app_entry {
            plan.push(LoadTarget::AppEntry(entry.clone()));
        }
        plan.extend(self.local_files.iter().cloned().map(LoadTarget::LocalFile));
        plan.push(LoadTarget::Blank);
        plan
    }
}

/// Static attributes of the main window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub icon_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("could not load {target}: {reason}")]
    Load { target: String, reason: String },
    #[error("window '{label}' operation failed: {reason}")]
    Operation { label: String, reason: String },
}

impl Classified for WindowError {
    fn class(&self) -> ErrorClass {
        ErrorClass::SurfaceCreation
    }
}

/// Outcome of a close request on any window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Suppress the close; the window was hidden instead.
    Hide,
    /// Let the close proceed.
    Allow,
}

/// Window operations required by [`WindowManager`].
pub trait MainWindowBackend {
    fn exists(&self, label: &str) -> bool;
    fn build(&self, label: &str, spec: &WindowSpec, target: &LoadTarget) -> Result<(), String>;
    fn is_visible(&self, label: &str) -> Result<bool, String>;
    fn is_minimized(&self, label: &str) -> Result<bool, String>;
    fn unminimize(&self, label: &str) -> Result<(), String>;
    fn show(&self, label: &str) -> Result<(), String>;
    fn hide(&self, label: &str) -> Result<(), String>;
    fn set_focus(&self, label: &str) -> Result<(), String>;
    fn destroy(&self, label: &str) -> Result<(), String>;
}

/// Tauri backend implementation for [`MainWindowBackend`].
#[derive(Clone)]
pub struct TauriWindows {
    app: AppHandle,
}

impl TauriWindows {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn get_window(&self, label: &str) -> Result<tauri::WebviewWindow, String> {
        self.app
            .get_webview_window(label)
            .ok_or_else(|| format!("window '{label}' not found"))
    }

    fn webview_url(&self, target: &LoadTarget) -> Result<WebviewUrl, String> {
        match target {
            LoadTarget::DevServer(url) => Url::parse(url)
                .map(WebviewUrl::External)
                .map_err(|e| format!("invalid dev server url: {e}")),
            LoadTarget::AppEntry(path) => {
                if self.app.asset_resolver().get(path.clone()).is_none() {
                    return Err(format!("asset '{path}' is not embedded"));
                }
                Ok(WebviewUrl::App(PathBuf::from(path)))
            }
            LoadTarget::LocalFile(path) => {
                if !path.is_file() {
                    return Err("file does not exist".to_string());
                }
                Url::from_file_path(path)
                    .map(WebviewUrl::External)
                    .map_err(|_| "path is not absolute".to_string())
            }
            LoadTarget::Blank => Url::parse("about:blank")
                .map(WebviewUrl::External)
                .map_err(|e| e.to_string()),
        }
    }
}

impl MainWindowBackend for TauriWindows {
    fn exists(&self, label: &str) -> bool {
        self.app.get_webview_window(label).is_some()
    }

    fn build(&self, label: &str, spec: &WindowSpec, target: &LoadTarget) -> Result<(), String> {
        let url = self.webview_url(target)?;
        let mut builder = WebviewWindowBuilder::new(&self.app, label, url)
            .title(&spec.title)
            .inner_size(f64::from(spec.width), f64::from(spec.height))
            .visible(true);

        if let Some(path) = &spec.icon_path {
            match icon::load_icon_file(path) {
                Ok(image) => builder = builder.icon(image).map_err(|e| e.to_string())?,
                Err(e) => error::report("main window icon", &e),
            }
        }

        builder.build().map(|_| ()).map_err(|e| e.to_string())
    }

    fn is_visible(&self, label: &str) -> Result<bool, String> {
        self.get_window(label)?
            .is_visible()
            .map_err(|e| e.to_string())
    }

    fn is_minimized(&self, label: &str) -> Result<bool, String> {
        self.get_window(label)?
            .is_minimized()
            .map_err(|e| e.to_string())
    }

    fn unminimize(&self, label: &str) -> Result<(), String> {
        self.get_window(label)?
            .unminimize()
            .map_err(|e| e.to_string())
    }

    fn show(&self, label: &str) -> Result<(), String> {
        self.get_window(label)?.show().map_err(|e| e.to_string())
    }

    fn hide(&self, label: &str) -> Result<(), String> {
        self.get_window(label)?.hide().map_err(|e| e.to_string())
    }

    fn set_focus(&self, label: &str) -> Result<(), String> {
        self.get_window(label)?
            .set_focus()
            .map_err(|e| e.to_string())
    }

    fn destroy(&self, label: &str) -> Result<(), String> {
        self.get_window(label)?.destroy().map_err(|e| e.to_string())
    }
}

/// Main window lifecycle coordinator.
pub struct WindowManager {
    state: Arc<ProcessState>,
    title: String,
    width: u32,
    height: u32,
    sources: ContentSources,
    icons: IconLocations,
}

impl WindowManager {
    pub fn new(
        state: Arc<ProcessState>,
        config: &WindowConfig,
        sources: ContentSources,
        icons: IconLocations,
    ) -> Self {
        Self {
            state,
            title: config.title.clone(),
            width: config.width,
            height: config.height,
            sources,
            icons,
        }
    }

    /// Build the main window, degrading through the content plan.
    ///
    /// Returns the window label, or `None` if not even a blank window could
    /// be built.
    pub fn create_window<B: MainWindowBackend + ?Sized>(&self, backend: &B) -> Option<String> {
        if self.state.main_phase() == MainWindowPhase::Creating {
            log::debug!("Main window creation already in progress");
            return None;
        }
        self.state.set_main_phase(MainWindowPhase::Creating);

        let spec = WindowSpec {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            icon_path: self.icons.probe(),
        };
        if spec.icon_path.is_none() {
            log::info!("No window icon found, continuing without one");
        }

        for target in self.sources.load_plan() {
            match backend.build(MAIN_WINDOW_LABEL, &spec, &target) {
                Ok(()) => {
                    self.state
                        .registry()
                        .register(MAIN_WINDOW_LABEL, WindowRole::Main);
                    self.state.set_main_phase(MainWindowPhase::Visible);
                    log::info!("Main window created from {}", target);
                    return Some(MAIN_WINDOW_LABEL.to_string());
                }
                Err(reason) => error::report(
                    "main window load",
                    &WindowError::Load {
                        target: target.to_string(),
                        reason,
                    },
                ),
            }
        }

        self.state.set_main_phase(MainWindowPhase::Absent);
        None
    }

    /// Decide what a close request on `label` does.
    ///
    /// The main window is hidden instead of closed unless the process is
    /// quitting. The caller must prevent the close on [`CloseDecision::Hide`].
    pub fn handle_close_request<B: MainWindowBackend + ?Sized>(
        &self,
        backend: &B,
        label: &str,
    ) -> CloseDecision {
        if self.state.registry().role_of(label) != Some(WindowRole::Main) {
            return CloseDecision::Allow;
        }
        if self.state.is_quitting() {
            log::info!("Closing main window during quit");
            return CloseDecision::Allow;
        }

        if let Err(reason) = backend.hide(label) {
            self.report_operation(label, reason);
        }
        self.state.set_main_phase(MainWindowPhase::Hidden);
        CloseDecision::Hide
    }

    /// Forget the main window once the runtime destroyed it.
    pub fn handle_destroyed(&self, label: &str) -> bool {
        if self.state.registry().role_of(label) != Some(WindowRole::Main) {
            return false;
        }
        self.state.registry().unregister(label);
        self.state.set_main_phase(MainWindowPhase::Destroyed);
        log::info!("Main window destroyed");
        true
    }

    /// Restore, show and focus the main window, creating it if needed.
    pub fn activate<B: MainWindowBackend + ?Sized>(&self, backend: &B) {
        match self.live_main_label(backend) {
            Some(label) => self.restore(backend, &label),
            None => {
                self.create_window(backend);
            }
        }
    }

    /// Tray click: hide a visible window, otherwise bring it forward.
    pub fn toggle_visibility<B: MainWindowBackend + ?Sized>(&self, backend: &B) {
        let Some(label) = self.live_main_label(backend) else {
            self.create_window(backend);
            return;
        };

        match backend.is_visible(&label) {
            Ok(true) => {
                if let Err(reason) = backend.hide(&label) {
                    self.report_operation(&label, reason);
                    return;
                }
                self.state.set_main_phase(MainWindowPhase::Hidden);
            }
            Ok(false) => self.restore(backend, &label),
            Err(reason) => {
                log::warn!("Unable to read main window visibility: {}", reason);
                self.restore(backend, &label);
            }
        }
    }

    /// Destroy every registered window, bypassing hide-on-close.
    pub fn close_all<B: MainWindowBackend + ?Sized>(&self, backend: &B) -> usize {
        let mut closed = 0;
        for label in self.state.registry().labels() {
            if !backend.exists(&label) {
                continue;
            }
            match backend.destroy(&label) {
                Ok(()) => closed += 1,
                Err(reason) => self.report_operation(&label, reason),
            }
        }
        log::info!("Closed {} window(s)", closed);
        closed
    }

    fn live_main_label<B: MainWindowBackend + ?Sized>(&self, backend: &B) -> Option<String> {
        let label = self.state.registry().find(WindowRole::Main)?;
        if backend.exists(&label) {
            return Some(label);
        }
        log::debug!("Main window '{}' is gone, dropping stale entry", label);
        self.state.registry().unregister(&label);
        self.state.set_main_phase(MainWindowPhase::Destroyed);
        None
    }

    fn restore<B: MainWindowBackend + ?Sized>(&self, backend: &B, label: &str) {
        if matches!(backend.is_minimized(label), Ok(true)) {
            if let Err(reason) = backend.unminimize(label) {
                self.report_operation(label, reason);
            }
        }
        if let Err(reason) = backend.show(label) {
            self.report_operation(label, reason);
            return;
        }
        if let Err(reason) = backend.set_focus(label) {
            self.report_operation(label, reason);
        }
        self.state.set_main_phase(MainWindowPhase::Visible);
    }

    fn report_operation(&self, label: &str, reason: String) {
        error::report(
            "main window",
            &WindowError::Operation {
                label: label.to_string(),
                reason,
            },
        );
    }
}
