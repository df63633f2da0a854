//! Typed message bus between the supervisor and its display surfaces.
//!
//! Channels are the kebab-case event names the web surfaces use. Payloads
//! travel as JSON; the typed structs below are the contract for each channel.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tauri::{AppHandle, Emitter, Listener};
use thiserror::Error;

use crate::notification::{AuditStatus, WorkArea};

/// Identifier returned by [`MessageBus::subscribe`].
pub type ListenerId = tauri::EventId;

/// Subscriber callback. Receives the raw JSON payload.
pub type Handler = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// Every channel the supervisor speaks on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    ShowPersistentNotification,
    NotificationShown,
    NotificationAction,
    NotificationLoaded,
    GetAppVersion,
    AppVersion,
    StartUpdate,
    DownloadProgress,
    UpdateStatus,
    DisplayMetricsChanged,
}

impl Channel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ShowPersistentNotification => "show-persistent-notification",
            Self::NotificationShown => "notification-shown",
            Self::NotificationAction => "notification-action",
            Self::NotificationLoaded => "notification-loaded",
            Self::GetAppVersion => "get-app-version",
            Self::AppVersion => "app-version",
            Self::StartUpdate => "start-update",
            Self::DownloadProgress => "download-progress",
            Self::UpdateStatus => "update-status",
            Self::DisplayMetricsChanged => "display-metrics-changed",
        }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to encode payload for {channel}: {source}")]
    Encode {
        channel: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to emit on {channel}: {reason}")]
    Emit {
        channel: &'static str,
        reason: String,
    },
}

/// Transport-agnostic publish/subscribe.
pub trait MessageBus: Send + Sync {
    fn publish_value(&self, channel: Channel, payload: Value) -> Result<(), BusError>;
    fn subscribe(&self, channel: Channel, handler: Handler) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}

/// Serialize `payload` and publish it on `channel`.
pub fn publish<B, T>(bus: &B, channel: Channel, payload: &T) -> Result<(), BusError>
where
    B: MessageBus + ?Sized,
    T: Serialize,
{
    let value = serde_json::to_value(payload).map_err(|source| BusError::Encode {
        channel: channel.name(),
        source,
    })?;
    bus.publish_value(channel, value)
}

/// Decode a payload, logging and dropping malformed messages.
pub fn decode<T: for<'de> Deserialize<'de>>(channel: Channel, payload: Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            log::warn!("Dropping malformed {} message: {}", channel.name(), e);
            None
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// `show-persistent-notification`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowNotificationMessage {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub audit_status: Option<AuditStatus>,
}

/// `notification-shown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationShown {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationActionKind {
    View,
}

/// `notification-action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub action: NotificationActionKind,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Label of the overlay that raised the action, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
}

/// `notification-loaded`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLoaded {
    #[serde(default)]
    pub overlay: Option<String>,
}

/// `app-version`, the reply to `get-app-version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub version: String,
}

/// `start-update`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartUpdateMessage {
    #[serde(default)]
    pub version: Option<String>,
    pub url: String,
}

/// `display-metrics-changed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMetricsChanged {
    pub work_area: WorkArea,
}

// ============================================================================
// TAURI TRANSPORT
// ============================================================================

/// Bus backed by the Tauri event system.
#[derive(Clone)]
pub struct TauriBus {
    app: AppHandle,
}

impl TauriBus {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl MessageBus for TauriBus {
    fn publish_value(&self, channel: Channel, payload: Value) -> Result<(), BusError> {
        self.app
            .emit(channel.name(), payload)
            .map_err(|e| BusError::Emit {
                channel: channel.name(),
                reason: e.to_string(),
            })
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> ListenerId {
        self.app.listen_any(channel.name(), move |event| {
            let payload = match event.payload() {
                "" => Value::Null,
                raw => match serde_json::from_str::<Value>(raw) {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("Ignoring non-JSON {} payload: {}", channel.name(), e);
                        return;
                    }
                },
            };
            handler(payload);
        })
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.app.unlisten(id);
    }
}
