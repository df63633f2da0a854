//! Persistent notification overlays.
//!
//! This module provides:
//! - Frameless, always-on-top overlay windows that never auto-dismiss
//! - Audit-status driven content (status line, colour, action button)
//! - Bottom-right placement that follows display geometry changes
//! - The view action: reveal the referenced file, then raise the main window
//! - A system notification fallback when no overlay can be built
//!
//! Every overlay owns its bus subscriptions; closing it unsubscribes them.

mod content;
mod host;
mod position;
mod request;
mod reveal;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use content::OverlayContent;
pub use host::TauriOverlayHost;
pub use position::{compute_overlay_position, OverlayPlacement, WorkArea};
pub use request::{AuditStatus, NotificationRequest};
pub use reveal::{open_file_path_with_fallback, FileOpener, RevealOutcome};

use crate::bus::{
    self, Channel, Handler, ListenerId, MessageBus, NotificationAction, NotificationActionKind,
    NotificationLoaded, NotificationShown, ShowNotificationMessage,
};
use crate::config::NotificationConfig;
use crate::error::{self, Classified, ErrorClass};
use crate::state::{lock, ProcessState, WindowRole};
use crate::window::{MainWindowBackend, WindowManager};

pub const OVERLAY_LABEL_PREFIX: &str = "notification-";

/// Overlay page inside the embedded frontend assets.
pub const NOTIFICATION_TEMPLATE: &str = "notification.html";

/// Static attributes of an overlay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

/// Window and shell operations required by [`NotificationCenter`].
pub trait OverlayHost: FileOpener + Send + Sync {
    fn template_available(&self) -> bool;
    fn create_overlay(&self, label: &str, spec: &OverlaySpec) -> Result<(), String>;
    fn primary_work_area(&self) -> Result<Option<WorkArea>, String>;
    fn set_position(&self, label: &str, x: i32, y: i32) -> Result<(), String>;
    fn render(&self, label: &str, script: &str) -> Result<(), String>;
    fn show(&self, label: &str) -> Result<(), String>;
    fn close(&self, label: &str) -> Result<(), String>;
    fn system_notify(&self, title: &str, body: &str) -> Result<(), String>;
    /// Backend used to raise the main window after a view action.
    fn windows(&self) -> &dyn MainWindowBackend;
    /// Run `task` outside the bus dispatch that delivered it. Building a
    /// window from inside an event handler deadlocks on Windows.
    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>);
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("notification template '{0}' is not available")]
    TemplateMissing(&'static str),
    #[error("failed to encode overlay content: {0}")]
    Content(#[from] serde_json::Error),
    #[error("failed to create overlay '{label}': {reason}")]
    Create { label: String, reason: String },
    #[error("overlay '{label}' operation failed: {reason}")]
    Window { label: String, reason: String },
    #[error("no monitor available for overlay positioning")]
    MonitorUnavailable,
    #[error("system notification failed: {0}")]
    SystemNotification(String),
}

impl Classified for OverlayError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::TemplateMissing(_) | Self::MonitorUnavailable => ErrorClass::ResourceResolution,
            Self::Content(_) => ErrorClass::Unexpected,
            Self::Create { .. } | Self::Window { .. } | Self::SystemNotification(_) => {
                ErrorClass::SurfaceCreation
            }
        }
    }
}

/// Handle to a live overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayHandle {
    pub label: String,
}

struct OverlaySession {
    request: NotificationRequest,
    content: OverlayContent,
    listeners: Vec<ListenerId>,
    rendered: bool,
}

/// Owns every live overlay and its subscriptions.
pub struct NotificationCenter<B, H> {
    state: Arc<ProcessState>,
    bus: Arc<B>,
    host: H,
    windows: Arc<WindowManager>,
    config: NotificationConfig,
    sessions: Mutex<HashMap<String, OverlaySession>>,
    me: Weak<Self>,
}

impl<B, H> NotificationCenter<B, H>
where
    B: MessageBus + 'static,
    H: OverlayHost + 'static,
{
    pub fn new(
        state: Arc<ProcessState>,
        bus: Arc<B>,
        host: H,
        windows: Arc<WindowManager>,
        config: NotificationConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            state,
            bus,
            host,
            windows,
            config,
            sessions: Mutex::new(HashMap::new()),
            me: me.clone(),
        })
    }

    /// Build a request from a wire message, applying configured defaults.
    pub fn request_from(&self, message: ShowNotificationMessage) -> NotificationRequest {
        NotificationRequest::new(
            message.body,
            message.file_path,
            message.audit_status,
            &self.config.default_body,
        )
    }

    /// Raise a persistent notification.
    ///
    /// Never fails: when no overlay can be built a system notification is
    /// attempted instead and `None` is returned.
    pub fn show(&self, request: NotificationRequest) -> Option<OverlayHandle> {
        match self.open_overlay(&request) {
            Ok(handle) => {
                log::info!(
                    "Notification overlay {} opened ({:?})",
                    handle.label,
                    request.audit_status
                );
                Some(handle)
            }
            Err(e) => {
                error::report("persistent notification", &e);
                self.notify_system(&request);
                None
            }
        }
    }

    /// Serve `show-persistent-notification` requests arriving on the bus.
    pub fn listen_for_requests(&self) -> ListenerId {
        let me = self.me.clone();
        self.bus.subscribe(
            Channel::ShowPersistentNotification,
            Arc::new(move |payload| {
                if let Some(center) = me.upgrade() {
                    let host_center = Arc::clone(&center);
                    host_center.host.dispatch(Box::new(move || {
                        error::guard("show-persistent-notification", || {
                            center.on_show_request(payload)
                        });
                    }));
                }
            }),
        )
    }

    /// The overlay's action control was clicked.
    ///
    /// Approved overlays publish one view action; every click closes the
    /// overlay. Returns `false` for unknown labels.
    pub fn handle_click(&self, label: &str) -> bool {
        let clicked = lock(&self.sessions).get(label).map(|session| {
            (
                session.request.audit_status,
                session.request.file_path.clone(),
            )
        });
        let Some((status, file_path)) = clicked else {
            log::warn!("Click for unknown overlay {}", label);
            return false;
        };

        if status.is_approved() {
            let action = NotificationAction {
                action: NotificationActionKind::View,
                file_path,
                overlay: Some(label.to_string()),
            };
            if let Err(e) = bus::publish(&*self.bus, Channel::NotificationAction, &action) {
                log::error!("Failed to publish view action: {}", e);
            }
        } else {
            log::info!("Rejected notification {} acknowledged", label);
        }

        self.dismiss(label);
        true
    }

    /// Close an overlay and release its subscriptions.
    pub fn dismiss(&self, label: &str) -> bool {
        if !lock(&self.sessions).contains_key(label) {
            return false;
        }
        if let Err(reason) = self.host.close(label) {
            error::report(
                "overlay close",
                &OverlayError::Window {
                    label: label.to_string(),
                    reason,
                },
            );
        }
        self.handle_closed(label)
    }

    /// Drop all state for a closed overlay. Safe to call more than once.
    pub fn handle_closed(&self, label: &str) -> bool {
        let Some(session) = lock(&self.sessions).remove(label) else {
            return false;
        };
        for id in session.listeners {
            self.bus.unsubscribe(id);
        }
        self.state.registry().unregister(label);
        log::info!("Notification overlay {} closed", label);
        true
    }

    pub fn active_overlays(&self) -> Vec<String> {
        let mut labels = lock(&self.sessions).keys().cloned().collect::<Vec<_>>();
        labels.sort();
        labels
    }

    fn open_overlay(&self, request: &NotificationRequest) -> Result<OverlayHandle, OverlayError> {
        if !self.host.template_available() {
            return Err(OverlayError::TemplateMissing(NOTIFICATION_TEMPLATE));
        }

        let content = OverlayContent::from_request(request, &self.config.title);
        content.render_script()?;

        let label = format!("{}{}", OVERLAY_LABEL_PREFIX, Uuid::new_v4().simple());
        lock(&self.sessions).insert(
            label.clone(),
            OverlaySession {
                request: request.clone(),
                content,
                listeners: Vec::new(),
                rendered: false,
            },
        );
        self.subscribe_overlay(&label);
        self.state.registry().register(&label, WindowRole::Overlay);

        let spec = OverlaySpec {
            title: self.config.title.clone(),
            width: self.config.width,
            height: self.config.height,
        };
        if let Err(reason) = self.host.create_overlay(&label, &spec) {
            self.handle_closed(&label);
            return Err(OverlayError::Create { label, reason });
        }

        if let Err(e) = self.reposition(&label) {
            error::report("overlay placement", &e);
        }
        Ok(OverlayHandle { label })
    }

    fn subscribe_overlay(&self, label: &str) {
        let ids = vec![
            self.bus.subscribe(
                Channel::NotificationAction,
                self.overlay_handler(label, Self::on_action),
            ),
            self.bus.subscribe(
                Channel::DisplayMetricsChanged,
                self.overlay_handler(label, Self::on_display_changed),
            ),
            self.bus.subscribe(
                Channel::NotificationLoaded,
                self.overlay_handler(label, Self::on_loaded),
            ),
        ];

        match lock(&self.sessions).get_mut(label) {
            Some(session) => session.listeners = ids,
            None => {
                for id in ids {
                    self.bus.unsubscribe(id);
                }
            }
        }
    }

    fn overlay_handler(&self, label: &str, on_event: fn(&Self, &str, Value)) -> Handler {
        let me = self.me.clone();
        let label = label.to_string();
        Arc::new(move |payload| {
            if let Some(center) = me.upgrade() {
                let label = label.clone();
                let host_center = Arc::clone(&center);
                host_center.host.dispatch(Box::new(move || {
                    error::guard("overlay listener", || on_event(&center, &label, payload));
                }));
            }
        })
    }

    fn on_show_request(&self, payload: Value) {
        let Some(message) =
            bus::decode::<ShowNotificationMessage>(Channel::ShowPersistentNotification, payload)
        else {
            return;
        };
        let success = self.show(self.request_from(message)).is_some();
        if let Err(e) = bus::publish(
            &*self.bus,
            Channel::NotificationShown,
            &NotificationShown { success },
        ) {
            log::warn!("Failed to reply to notification request: {}", e);
        }
    }

    fn on_action(&self, label: &str, payload: Value) {
        let Some(action) = bus::decode::<NotificationAction>(Channel::NotificationAction, payload)
        else {
            return;
        };
        // Untagged actions come from pages that predate overlay labels.
        if action
            .overlay
            .as_deref()
            .is_some_and(|source| source != label)
        {
            return;
        }

        match action.action {
            NotificationActionKind::View => self.handle_view(action.file_path.as_deref()),
        }
    }

    fn handle_view(&self, file_path: Option<&Path>) {
        match file_path {
            Some(path) => {
                let outcome = open_file_path_with_fallback(&self.host, path);
                if !outcome.succeeded() {
                    log::warn!("Could not surface {}: {:?}", path.display(), outcome);
                }
            }
            None => log::info!("View action without a file path"),
        }
        self.windows.activate(self.host.windows());
    }

    fn on_display_changed(&self, label: &str, _payload: Value) {
        if let Err(e) = self.reposition(label) {
            error::report("overlay placement", &e);
        }
    }

    fn on_loaded(&self, label: &str, payload: Value) {
        let loaded = bus::decode::<NotificationLoaded>(Channel::NotificationLoaded, payload)
            .unwrap_or_default();
        match loaded.overlay.as_deref() {
            Some(source) if source == label => self.on_surface_ready(label),
            Some(_) => {}
            None => log::debug!("Overlay loaded signal without label"),
        }
    }

    fn on_surface_ready(&self, label: &str) {
        let script = {
            let mut sessions = lock(&self.sessions);
            let Some(session) = sessions.get_mut(label) else {
                return;
            };
            if session.rendered {
                return;
            }
            session.rendered = true;
            session.content.render_script()
        };

        let shown = script
            .map_err(OverlayError::from)
            .and_then(|script| {
                self.host
                    .render(label, &script)
                    .and_then(|()| self.host.show(label))
                    .map_err(|reason| OverlayError::Window {
                        label: label.to_string(),
                        reason,
                    })
            });

        match shown {
            Ok(()) => {
                if let Err(e) = self.reposition(label) {
                    error::report("overlay placement", &e);
                }
                log::info!("Notification overlay {} shown", label);
            }
            Err(e) => {
                error::report("overlay render", &e);
                let request = lock(&self.sessions)
                    .get(label)
                    .map(|session| session.request.clone());
                self.dismiss(label);
                if let Some(request) = request {
                    self.notify_system(&request);
                }
            }
        }
    }

    fn reposition(&self, label: &str) -> Result<(), OverlayError> {
        let work_area = self
            .host
            .primary_work_area()
            .map_err(|reason| OverlayError::Window {
                label: label.to_string(),
                reason,
            })?
            .ok_or(OverlayError::MonitorUnavailable)?;

        let (x, y) = compute_overlay_position(&work_area, self.placement());
        self.host
            .set_position(label, x, y)
            .map_err(|reason| OverlayError::Window {
                label: label.to_string(),
                reason,
            })
    }

    fn placement(&self) -> OverlayPlacement {
        OverlayPlacement {
            width: self.config.width,
            height: self.config.height,
            margin_x: self.config.margin_x,
            margin_y: self.config.margin_y,
        }
    }

    fn notify_system(&self, request: &NotificationRequest) {
        match self.host.system_notify(&self.config.title, &request.body) {
            Ok(()) => log::info!("Fell back to system notification"),
            Err(reason) => error::report(
                "system notification fallback",
                &OverlayError::SystemNotification(reason),
            ),
        }
    }
}
