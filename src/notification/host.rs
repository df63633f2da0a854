use std::path::{Path, PathBuf};

use tauri::webview::PageLoadEvent;
use tauri::{
    AppHandle, Emitter, Manager, PhysicalPosition, Position, WebviewUrl, WebviewWindowBuilder,
};
use tauri_plugin_notification::NotificationExt;
use tauri_plugin_opener::OpenerExt;

use super::{FileOpener, OverlayHost, OverlaySpec, WorkArea, NOTIFICATION_TEMPLATE};
use crate::bus::{Channel, NotificationLoaded};
use crate::window::{MainWindowBackend, TauriWindows};

/// Tauri implementation of [`OverlayHost`].
pub struct TauriOverlayHost {
    app: AppHandle,
    windows: TauriWindows,
}

impl TauriOverlayHost {
    pub fn new(app: AppHandle) -> Self {
        let windows = TauriWindows::new(app.clone());
        Self { app, windows }
    }

    fn get_overlay_window(&self, label: &str) -> Result<tauri::WebviewWindow, String> {
        self.app
            .get_webview_window(label)
            .ok_or_else(|| format!("overlay window '{label}' not found"))
    }
}

impl FileOpener for TauriOverlayHost {
    fn reveal(&self, path: &Path) -> Result<(), String> {
        self.app
            .opener()
            .reveal_item_in_dir(path)
            .map_err(|e| e.to_string())
    }

    fn open(&self, path: &Path) -> Result<(), String> {
        self.app
            .opener()
            .open_path(path.to_string_lossy(), None::<&str>)
            .map_err(|e| e.to_string())
    }
}

impl OverlayHost for TauriOverlayHost {
    fn template_available(&self) -> bool {
        self.app
            .asset_resolver()
            .get(NOTIFICATION_TEMPLATE.to_string())
            .is_some()
    }

    fn create_overlay(&self, label: &str, spec: &OverlaySpec) -> Result<(), String> {
        let app = self.app.clone();
        let page_label = label.to_string();

        WebviewWindowBuilder::new(
            &self.app,
            label,
            WebviewUrl::App(PathBuf::from(NOTIFICATION_TEMPLATE)),
        )
        .title(&spec.title)
        .inner_size(f64::from(spec.width), f64::from(spec.height))
        .decorations(false)
        .resizable(false)
        .minimizable(false)
        .maximizable(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .focused(false)
        .visible(false)
        .on_page_load(move |_window, payload| {
            if payload.event() != PageLoadEvent::Finished {
                return;
            }
            let loaded = NotificationLoaded {
                overlay: Some(page_label.clone()),
            };
            if let Err(e) = app.emit(Channel::NotificationLoaded.name(), loaded) {
                log::warn!("Failed to signal overlay load: {}", e);
            }
        })
        .build()
        .map(|_| ())
        .map_err(|e| e.to_string())
    }

    fn primary_work_area(&self) -> Result<Option<WorkArea>, String> {
        self.app
            .primary_monitor()
            .map(|monitor| monitor.as_ref().map(WorkArea::from_tauri_monitor))
            .map_err(|e| e.to_string())
    }

    fn set_position(&self, label: &str, x: i32, y: i32) -> Result<(), String> {
        self.get_overlay_window(label)?
            .set_position(Position::Physical(PhysicalPosition { x, y }))
            .map_err(|e| e.to_string())
    }

    fn render(&self, label: &str, script: &str) -> Result<(), String> {
        self.get_overlay_window(label)?
            .eval(script)
            .map_err(|e| e.to_string())
    }

    fn show(&self, label: &str) -> Result<(), String> {
        self.get_overlay_window(label)?
            .show()
            .map_err(|e| e.to_string())
    }

    fn close(&self, label: &str) -> Result<(), String> {
        self.get_overlay_window(label)?
            .close()
            .map_err(|e| e.to_string())
    }

    fn system_notify(&self, title: &str, body: &str) -> Result<(), String> {
        self.app
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(|e| e.to_string())
    }

    fn windows(&self) -> &dyn MainWindowBackend {
        &self.windows
    }

    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        tauri::async_runtime::spawn(async move { task() });
    }
}
