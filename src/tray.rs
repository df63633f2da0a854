//! System tray icon and menu.
//!
//! This module provides:
//! - Tray icon resolved through the shared probe order, with embedded fallbacks
//! - A fixed two-action menu: show the main window, quit
//! - Left click toggling main window visibility

use std::sync::Arc;

use tauri::menu::{Menu, MenuEvent, MenuId, MenuItemBuilder, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use tauri::{image::Image, AppHandle};
use thiserror::Error;

use crate::error::{self, Classified, ErrorClass};
use crate::icon::{self, IconLocations};
use crate::state::ProcessState;
use crate::window::{TauriWindows, WindowManager};

/// Tray menu item IDs.
mod menu_ids {
    pub const SHOW_WINDOW: &str = "show_window";
    pub const QUIT: &str = "quit";
}

pub const TRAY_ID: &str = "main-tray";

/// Pure tray menu tree, independent of any Tauri runtime handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayMenuEntry {
    Separator,
    Action { id: String, text: String },
}

/// What a menu item asks the supervisor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    ShowWindow,
    Quit,
}

impl TrayCommand {
    pub fn from_menu_id(id: &str) -> Option<Self> {
        match id {
            menu_ids::SHOW_WINDOW => Some(Self::ShowWindow),
            menu_ids::QUIT => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrayError {
    #[error("failed to build tray menu: {0}")]
    Menu(tauri::Error),
    #[error("failed to build tray icon: {0}")]
    Icon(tauri::Error),
}

impl Classified for TrayError {
    fn class(&self) -> ErrorClass {
        ErrorClass::SurfaceCreation
    }
}

/// Pure menu builder.
pub fn build_tray_menu() -> Vec<TrayMenuEntry> {
    vec![
        TrayMenuEntry::Action {
            id: menu_ids::SHOW_WINDOW.to_string(),
            text: "显示窗口".to_string(),
        },
        TrayMenuEntry::Separator,
        TrayMenuEntry::Action {
            id: menu_ids::QUIT.to_string(),
            text: "退出".to_string(),
        },
    ]
}

/// Process exit primitives used by the quit action.
pub trait ProcessControl {
    /// Orderly exit through the runtime.
    fn request_exit(&self) -> Result<(), String>;
    /// Immediate termination, used when the orderly path fails.
    fn force_exit(&self);
}

/// Mark the process quitting, then ask the runtime to exit.
///
/// Falls back to a forced exit if the request errors or panics.
pub fn quit<C: ProcessControl + ?Sized>(state: &ProcessState, control: &C) {
    state.mark_quitting();
    log::info!("Quit requested");

    match error::guard("exit request", || control.request_exit()) {
        Some(Ok(())) => {}
        Some(Err(reason)) => {
            log::error!("Exit request failed: {}, forcing exit", reason);
            control.force_exit();
        }
        None => control.force_exit(),
    }
}

/// [`ProcessControl`] over the Tauri runtime.
pub struct TauriProcessControl {
    app: AppHandle,
}

impl TauriProcessControl {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl ProcessControl for TauriProcessControl {
    fn request_exit(&self) -> Result<(), String> {
        self.app.exit(0);
        Ok(())
    }

    fn force_exit(&self) {
        std::process::exit(0);
    }
}

/// Icon for the tray: probed file, then the embedded icon, then a blank image.
pub fn tray_image(locations: &IconLocations) -> Image<'static> {
    match icon::resolve_icon(locations) {
        Ok(image) => return image,
        Err(e) => error::report("tray icon", &e),
    }
    match icon::load_png_icon(icon::BUNDLED_ICON) {
        Ok(image) => image,
        Err(e) => {
            error::report("bundled tray icon", &e);
            icon::placeholder_icon()
        }
    }
}

fn build_system_tray_menu(app: &AppHandle) -> Result<Menu<tauri::Wry>, tauri::Error> {
    let menu = Menu::new(app)?;
    for entry in build_tray_menu() {
        match entry {
            TrayMenuEntry::Separator => menu.append(&PredefinedMenuItem::separator(app)?)?,
            TrayMenuEntry::Action { id, text } => {
                let item = MenuItemBuilder::with_id(MenuId::new(id), text).build(app)?;
                menu.append(&item)?;
            }
        }
    }
    Ok(menu)
}

/// Create the tray icon. Failure is logged and yields `None`.
pub fn create_tray(
    app: &AppHandle,
    state: Arc<ProcessState>,
    windows: Arc<WindowManager>,
    locations: &IconLocations,
    tooltip: &str,
) -> Option<TrayIcon> {
    let menu = match build_system_tray_menu(app) {
        Ok(menu) => menu,
        Err(e) => {
            error::report("tray", &TrayError::Menu(e));
            return None;
        }
    };

    let menu_windows = Arc::clone(&windows);
    let result = TrayIconBuilder::with_id(TRAY_ID)
        .icon(tray_image(locations))
        .tooltip(tooltip)
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(move |app, event| {
            error::guard("tray menu", || {
                handle_menu_event(app, event, &state, &menu_windows)
            });
        })
        .on_tray_icon_event(move |tray, event| {
            error::guard("tray click", || handle_tray_event(tray, event, &windows));
        })
        .build(app);

    match result {
        Ok(tray) => {
            log::info!("Tray icon initialized");
            Some(tray)
        }
        Err(e) => {
            error::report("tray", &TrayError::Icon(e));
            None
        }
    }
}

fn handle_menu_event(
    app: &AppHandle,
    event: MenuEvent,
    state: &ProcessState,
    windows: &WindowManager,
) {
    let id = event.id().as_ref();
    match TrayCommand::from_menu_id(id) {
        Some(TrayCommand::ShowWindow) => windows.activate(&TauriWindows::new(app.clone())),
        Some(TrayCommand::Quit) => quit(state, &TauriProcessControl::new(app.clone())),
        None => log::debug!("Tray: Unhandled menu event: {}", id),
    }
}

fn handle_tray_event(tray: &TrayIcon, event: TrayIconEvent, windows: &WindowManager) {
    if let TrayIconEvent::Click {
        button: MouseButton::Left,
        button_state: MouseButtonState::Up,
        ..
    } = event
    {
        windows.toggle_visibility(&TauriWindows::new(tray.app_handle().clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MockControl {
        fail_request: bool,
        panic_request: bool,
        calls: RefCell<Vec<&'static str>>,
    }

    impl ProcessControl for MockControl {
        fn request_exit(&self) -> Result<(), String> {
            self.calls.borrow_mut().push("request_exit");
            if self.panic_request {
                panic!("runtime gone");
            }
            if self.fail_request {
                return Err("event loop closed".to_string());
            }
            Ok(())
        }

        fn force_exit(&self) {
            self.calls.borrow_mut().push("force_exit");
        }
    }

    #[test]
    fn test_build_tray_menu_structure() {
        let menu = build_tray_menu();

        assert_eq!(menu.len(), 3);
        assert!(matches!(
            &menu[0],
            TrayMenuEntry::Action { id, text } if id == menu_ids::SHOW_WINDOW && text == "显示窗口"
        ));
        assert_eq!(menu[1], TrayMenuEntry::Separator);
        assert!(matches!(
            &menu[2],
            TrayMenuEntry::Action { id, text } if id == menu_ids::QUIT && text == "退出"
        ));
    }

    #[test]
    fn test_menu_ids_map_to_commands() {
        for entry in build_tray_menu() {
            if let TrayMenuEntry::Action { id, .. } = entry {
                assert!(TrayCommand::from_menu_id(&id).is_some(), "unmapped id {id}");
            }
        }
        assert_eq!(TrayCommand::from_menu_id("unknown"), None);
    }

    #[test]
    fn test_quit_marks_quitting_before_exit() {
        let state = ProcessState::new();
        let control = MockControl::default();

        quit(&state, &control);

        assert!(state.is_quitting());
        assert_eq!(*control.calls.borrow(), vec!["request_exit"]);
    }

    #[test]
    fn test_quit_forces_exit_on_error() {
        let state = ProcessState::new();
        let control = MockControl {
            fail_request: true,
            ..Default::default()
        };

        quit(&state, &control);

        assert_eq!(*control.calls.borrow(), vec!["request_exit", "force_exit"]);
    }

    #[test]
    fn test_quit_forces_exit_on_panic() {
        let state = ProcessState::new();
        let control = MockControl {
            panic_request: true,
            ..Default::default()
        };

        quit(&state, &control);

        assert!(state.is_quitting());
        assert_eq!(*control.calls.borrow(), vec!["request_exit", "force_exit"]);
    }

    #[test]
    fn test_tray_image_falls_back_to_bundled_icon() {
        let locations = IconLocations::new(None, None, None);
        let image = tray_image(&locations);

        assert_eq!((image.width(), image.height()), (32, 32));
    }
}
