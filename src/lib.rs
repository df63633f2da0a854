//! Kesai decrypt-request desktop client - Tauri supervisor library
//!
//! Owns the process-level concerns of the client: single instance, the main
//! window lifecycle, the tray, persistent notification overlays and the
//! self-update pipeline. The web UI is served from embedded assets.

pub mod bus;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod icon;
pub mod instance;
pub mod notification;
pub mod state;
pub mod tray;
pub mod update;
pub mod window;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tauri::{AppHandle, Manager, RunEvent, WindowEvent};

use bus::{Channel, MessageBus, StartUpdateMessage, TauriBus};
use config::SupervisorConfig;
use icon::IconLocations;
use instance::LaunchArgs;
use notification::{NotificationCenter, TauriOverlayHost};
use state::ProcessState;
use update::{DownloadOptions, UpdatePipeline};
use window::{CloseDecision, ContentSources, TauriWindows, WindowManager};

/// Notification center wired to the Tauri runtime.
pub type AppNotificationCenter = NotificationCenter<TauriBus, TauriOverlayHost>;

/// Configure and run the Tauri application
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    error::install_panic_hook();

    let launch = LaunchArgs::from_env();
    let config = config::load_or_init_config();
    let state = Arc::new(ProcessState::new());
    log::info!("Kesai decrypt-request client starting (hidden: {})", launch.hidden);

    // The single-instance plugin must come first.
    let mut builder = tauri::Builder::default().plugin(instance::single_instance_plugin());

    #[cfg(desktop)]
    {
        builder = builder.plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            Some(vec![instance::HIDDEN_ARG]),
        ));
    }

    let app = builder
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .manage(Arc::clone(&state))
        .on_window_event(handle_window_event)
        .invoke_handler(tauri::generate_handler![
            commands::show_persistent_notification,
            commands::notification_clicked,
            commands::notification_dismissed,
            commands::get_app_version,
            commands::start_update,
        ])
        .setup(move |app| {
            setup(app.handle(), state, config, launch);
            Ok(())
        })
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            log::error!("Error while building Tauri application: {}", e);
            std::process::exit(1);
        }
    };

    app.run(handle_run_event);
}

fn setup(app: &AppHandle, state: Arc<ProcessState>, config: SupervisorConfig, launch: LaunchArgs) {
    let resource_dir = app.path().resource_dir().ok();
    let icons = IconLocations::from_environment(resource_dir.clone());
    let windows = Arc::new(WindowManager::new(
        Arc::clone(&state),
        &config.window,
        ContentSources::from_environment(resource_dir.as_deref()),
        icons.clone(),
    ));
    app.manage(Arc::clone(&windows));

    let bus = Arc::new(TauriBus::new(app.clone()));
    let center: Arc<AppNotificationCenter> = NotificationCenter::new(
        Arc::clone(&state),
        Arc::clone(&bus),
        TauriOverlayHost::new(app.clone()),
        Arc::clone(&windows),
        config.notification.clone(),
    );
    center.listen_for_requests();
    app.manage(center);

    app.manage(Arc::new(UpdatePipeline::new(DownloadOptions::from_config(
        &config.update,
    ))));
    listen_for_bus_requests(app, &*bus);

    match tray::create_tray(
        app,
        Arc::clone(&state),
        Arc::clone(&windows),
        &icons,
        &config.window.title,
    ) {
        Some(tray) => state.set_tray(tray),
        None => log::warn!("Running without a tray icon"),
    }

    if launch.hidden {
        log::info!("Started hidden, main window deferred");
    } else {
        windows.create_window(&TauriWindows::new(app.clone()));
    }

    register_autostart(app, config.autostart.enabled);
    display::spawn_display_watcher(app.clone(), bus);

    log::info!("Kesai decrypt-request client ready (tray: {})", state.has_tray());
}

/// Serve `get-app-version` and `start-update` arriving on the bus.
fn listen_for_bus_requests<B: MessageBus + ?Sized>(app: &AppHandle, bus: &B) {
    let version_app = app.clone();
    bus.subscribe(
        Channel::GetAppVersion,
        Arc::new(move |_| {
            let reply = commands::app_version(&version_app);
            if let Err(e) = bus::publish(&TauriBus::new(version_app.clone()), Channel::AppVersion, &reply) {
                log::warn!("Failed to reply with app version: {}", e);
            }
        }),
    );

    let update_app = app.clone();
    bus.subscribe(
        Channel::StartUpdate,
        Arc::new(move |payload| {
            let Some(request) = bus::decode::<StartUpdateMessage>(Channel::StartUpdate, payload)
            else {
                return;
            };
            let app = update_app.clone();
            tauri::async_runtime::spawn(async move {
                commands::run_update(&app, request.version.as_deref(), &request.url).await;
            });
        }),
    );
}

#[cfg(all(not(debug_assertions), any(target_os = "windows", target_os = "macos")))]
fn register_autostart(app: &AppHandle, enabled: bool) {
    use tauri_plugin_autostart::ManagerExt;

    let autostart = app.autolaunch();
    let result = if enabled {
        autostart.enable()
    } else {
        match autostart.is_enabled() {
            Ok(true) => autostart.disable(),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        }
    };
    match result {
        Ok(()) => log::info!("Launch at login {}", if enabled { "enabled" } else { "disabled" }),
        Err(e) => log::warn!("Failed to update launch at login: {}", e),
    }
}

#[cfg(not(all(not(debug_assertions), any(target_os = "windows", target_os = "macos"))))]
fn register_autostart(_app: &AppHandle, enabled: bool) {
    log::debug!("Launch at login not managed on this build (configured: {})", enabled);
}

fn handle_window_event(window: &tauri::Window, event: &WindowEvent) {
    let app = window.app_handle();
    match event {
        WindowEvent::CloseRequested { api, .. } => {
            let Some(windows) = app.try_state::<Arc<WindowManager>>() else {
                return;
            };
            let decision = error::guard("close request", || {
                windows.handle_close_request(&TauriWindows::new(app.clone()), window.label())
            });
            if decision == Some(CloseDecision::Hide) {
                api.prevent_close();
            }
        }
        WindowEvent::Destroyed => {
            let label = window.label();
            error::guard("window destroyed", || {
                if let Some(windows) = app.try_state::<Arc<WindowManager>>() {
                    windows.handle_destroyed(label);
                }
                if let Some(center) = app.try_state::<Arc<AppNotificationCenter>>() {
                    center.handle_closed(label);
                }
            });
        }
        _ => {}
    }
}

fn handle_run_event(app: &AppHandle, event: RunEvent) {
    match event {
        RunEvent::ExitRequested { code, api, .. } => {
            let state = app.state::<Arc<ProcessState>>();
            match code {
                Some(code) => {
                    state.mark_quitting();
                    log::info!("Exiting with code {}", code);
                }
                // Closing the last window keeps the process alive in the tray.
                None if !state.is_quitting() => {
                    api.prevent_exit();
                    log::debug!("All windows closed, staying in the tray");
                }
                None => {}
            }
        }
        #[cfg(target_os = "macos")]
        RunEvent::Reopen { .. } => {
            if let Some(windows) = app.try_state::<Arc<WindowManager>>() {
                error::guard("reopen", || windows.activate(&TauriWindows::new(app.clone())));
            }
        }
        RunEvent::Exit => log::info!("Kesai decrypt-request client stopped"),
        _ => {}
    }
}
