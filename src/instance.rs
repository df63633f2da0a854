//! Single-instance coordination and launch arguments.

use std::sync::Arc;

use tauri::plugin::TauriPlugin;
use tauri::{Manager, Wry};

use crate::error;
use crate::window::{TauriWindows, WindowManager};

/// Launch argument that suppresses the initial main window.
pub const HIDDEN_ARG: &str = "--hidden";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchArgs {
    pub hidden: bool,
}

impl LaunchArgs {
    pub fn parse<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hidden: argv.into_iter().any(|arg| arg.as_ref() == HIDDEN_ARG),
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }
}

/// Single-instance plugin whose handler brings the primary's main window
/// forward.
///
/// Must be the first plugin registered so a redundant process exits before
/// anything else initializes.
pub fn single_instance_plugin() -> TauriPlugin<Wry> {
    tauri_plugin_single_instance::init(|app, argv, cwd| {
        log::info!("Second instance started in {}: {:?}", cwd, argv);
        error::guard("second instance", || {
            let Some(windows) = app.try_state::<Arc<WindowManager>>() else {
                log::warn!("Second instance signal before startup finished");
                return;
            };
            windows.activate(&TauriWindows::new(app.clone()));
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_flag_is_detected_anywhere() {
        assert!(LaunchArgs::parse(["--verbose", "--hidden"]).hidden);
        assert!(LaunchArgs::parse(vec![String::from("--hidden")]).hidden);
    }

    #[test]
    fn absent_or_similar_flags_show_window() {
        assert!(!LaunchArgs::parse(Vec::<String>::new()).hidden);
        assert!(!LaunchArgs::parse(["--hidden-extra", "hidden"]).hidden);
    }
}
