//! Process-wide supervisor state.
//!
//! A single [`ProcessState`] is created at startup and handed to every
//! component by `Arc`. It owns:
//! - the quitting flag that every close decision consults
//! - the window registry (label → role) maintained by whoever creates a window
//! - the main window lifecycle phase
//! - the tray handle
//!
//! # Main window phases
//!
//! ```text
//!     Absent ──► Creating ──► Visible ◄──► Hidden
//!                   ▲            │            │
//!                   │            ▼            ▼
//!                   └──────── Destroyed ◄─────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tauri::tray::TrayIcon;

/// Lifecycle phase of the main window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MainWindowPhase {
    /// No window has been created yet.
    #[default]
    Absent,
    /// A build attempt is in flight.
    Creating,
    Visible,
    Hidden,
    /// The window was destroyed; the next activation recreates it.
    Destroyed,
}

/// What a registered window is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowRole {
    Main,
    Overlay,
}

/// Label → role mapping for every window the supervisor created.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    entries: Mutex<HashMap<String, WindowRole>>,
}

impl WindowRegistry {
    pub fn register(&self, label: &str, role: WindowRole) {
        lock(&self.entries).insert(label.to_string(), role);
    }

    pub fn unregister(&self, label: &str) -> Option<WindowRole> {
        lock(&self.entries).remove(label)
    }

    pub fn role_of(&self, label: &str) -> Option<WindowRole> {
        lock(&self.entries).get(label).copied()
    }

    /// First label registered under `role`, if any.
    pub fn find(&self, role: WindowRole) -> Option<String> {
        let entries = lock(&self.entries);
        let mut labels = entries
            .iter()
            .filter(|(_, entry_role)| **entry_role == role)
            .map(|(label, _)| label.clone())
            .collect::<Vec<_>>();
        labels.sort();
        labels.into_iter().next()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels = lock(&self.entries).keys().cloned().collect::<Vec<_>>();
        labels.sort();
        labels
    }

    pub fn count(&self, role: WindowRole) -> usize {
        lock(&self.entries)
            .values()
            .filter(|entry_role| **entry_role == role)
            .count()
    }
}

/// Shared state injected into every supervisor component.
#[derive(Default)]
pub struct ProcessState {
    quitting: AtomicBool,
    main_phase: Mutex<MainWindowPhase>,
    registry: WindowRegistry,
    tray: Mutex<Option<TrayIcon>>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    /// Set the quitting flag. Returns `true` only for the call that flipped it.
    pub fn mark_quitting(&self) -> bool {
        let flipped = self
            .quitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if flipped {
            log::info!("Supervisor is quitting");
        }
        flipped
    }

    pub fn main_phase(&self) -> MainWindowPhase {
        *lock(&self.main_phase)
    }

    pub fn set_main_phase(&self, phase: MainWindowPhase) {
        let mut current = lock(&self.main_phase);
        if *current != phase {
            log::debug!("Main window phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn set_tray(&self, tray: TrayIcon) {
        *lock(&self.tray) = Some(tray);
    }

    pub fn has_tray(&self) -> bool {
        lock(&self.tray).is_some()
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quitting_flag_flips_once() {
        let state = ProcessState::new();
        assert!(!state.is_quitting());
        assert!(state.mark_quitting());
        assert!(!state.mark_quitting());
        assert!(state.is_quitting());
    }

    #[test]
    fn independent_states_do_not_share_flags() {
        let first = ProcessState::new();
        let second = ProcessState::new();
        first.mark_quitting();
        first.registry().register("main", WindowRole::Main);

        assert!(!second.is_quitting());
        assert!(second.registry().find(WindowRole::Main).is_none());
    }

    #[test]
    fn registry_finds_windows_by_role() {
        let registry = WindowRegistry::default();
        registry.register("notification-b", WindowRole::Overlay);
        registry.register("main", WindowRole::Main);
        registry.register("notification-a", WindowRole::Overlay);

        assert_eq!(registry.find(WindowRole::Main).as_deref(), Some("main"));
        assert_eq!(
            registry.find(WindowRole::Overlay).as_deref(),
            Some("notification-a")
        );
        assert_eq!(registry.count(WindowRole::Overlay), 2);

        assert_eq!(registry.unregister("main"), Some(WindowRole::Main));
        assert!(registry.find(WindowRole::Main).is_none());
        assert_eq!(registry.role_of("notification-b"), Some(WindowRole::Overlay));
    }

    #[test]
    fn main_phase_defaults_to_absent() {
        let state = ProcessState::new();
        assert_eq!(state.main_phase(), MainWindowPhase::Absent);
        state.set_main_phase(MainWindowPhase::Hidden);
        assert_eq!(state.main_phase(), MainWindowPhase::Hidden);
        assert!(!state.has_tray());
    }
}
