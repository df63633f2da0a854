//! Tauri commands exposed to the main window and overlay pages.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use tauri::{AppHandle, Manager, WebviewWindow};
use thiserror::Error;

use crate::bus::{
    self, AppVersion, Channel, MessageBus, NotificationShown, ShowNotificationMessage, TauriBus,
};
use crate::error;
use crate::update::{TauriUpdateHost, UpdatePipeline, UpdateStatus};
use crate::window::WindowManager;
use crate::AppNotificationCenter;

/// Command error types.
#[derive(Debug, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "code")]
pub enum CommandError {
    #[error("Update error: {message}")]
    Update { message: String },
}

// ============================================================================
// NOTIFICATION COMMANDS
// ============================================================================

/// Raise a persistent notification overlay.
///
/// Window-building commands are async so they run off the main thread.
#[tauri::command]
pub async fn show_persistent_notification(
    app: AppHandle,
    message: ShowNotificationMessage,
) -> NotificationShown {
    let Some(center) = notification_center(&app) else {
        return NotificationShown { success: false };
    };
    let request = center.request_from(message);
    NotificationShown {
        success: center.show(request).is_some(),
    }
}

/// The overlay's action button (or body) was clicked.
#[tauri::command]
pub async fn notification_clicked(window: WebviewWindow) -> bool {
    notification_center(window.app_handle())
        .is_some_and(|center| center.handle_click(window.label()))
}

/// The overlay asked to be closed without acting.
#[tauri::command]
pub async fn notification_dismissed(window: WebviewWindow) -> bool {
    notification_center(window.app_handle())
        .is_some_and(|center| center.dismiss(window.label()))
}

fn notification_center(app: &AppHandle) -> Option<Arc<AppNotificationCenter>> {
    let center = app
        .try_state::<Arc<AppNotificationCenter>>()
        .map(|state| Arc::clone(state.inner()));
    if center.is_none() {
        log::error!("Notification requested before startup finished");
    }
    center
}

// ============================================================================
// APP COMMANDS
// ============================================================================

#[tauri::command]
pub fn get_app_version(app: AppHandle) -> AppVersion {
    app_version(&app)
}

pub fn app_version(app: &AppHandle) -> AppVersion {
    AppVersion {
        version: app.package_info().version.to_string(),
    }
}

// ============================================================================
// UPDATE COMMANDS
// ============================================================================

/// Download and launch an update package.
///
/// Progress arrives as `download-progress` events; the outcome is both
/// returned and emitted as `update-status`.
#[tauri::command]
pub async fn start_update(
    app: AppHandle,
    version: Option<String>,
    url: String,
) -> Result<UpdateStatus, CommandError> {
    let status = run_update(&app, version.as_deref(), &url).await;
    if status.success {
        Ok(status)
    } else {
        Err(CommandError::Update {
            message: status.message.unwrap_or_default(),
        })
    }
}

/// Run the update pipeline with panics contained, publishing progress and
/// the final status on the bus.
pub async fn run_update(app: &AppHandle, version: Option<&str>, url: &str) -> UpdateStatus {
    let (Some(pipeline), Some(windows)) = (
        app.try_state::<Arc<UpdatePipeline>>()
            .map(|state| Arc::clone(state.inner())),
        app.try_state::<Arc<WindowManager>>()
            .map(|state| Arc::clone(state.inner())),
    ) else {
        log::error!("Update requested before startup finished");
        return UpdateStatus::failed("应用尚未就绪");
    };
    let bus = TauriBus::new(app.clone());
    let host = TauriUpdateHost::new(app.clone(), &windows);

    let attempt = pipeline.perform_update(&host, version, url, |progress| {
        if let Err(e) = bus::publish(&bus, Channel::DownloadProgress, &progress) {
            log::warn!("Failed to publish download progress: {}", e);
        }
    });

    let status = match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(status) => status,
        Err(payload) => {
            log::error!("Update panicked: {}", error::panic_message(payload.as_ref()));
            UpdateStatus::failed("更新过程中发生内部错误")
        }
    };

    publish_status(&bus, &status);
    status
}

fn publish_status<B: MessageBus + ?Sized>(bus: &B, status: &UpdateStatus) {
    if let Err(e) = bus::publish(bus, Channel::UpdateStatus, status) {
        log::warn!("Failed to publish update status: {}", e);
    }
}
