//! In-memory doubles for the window, overlay and bus seams.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::bus::{BusError, Channel, Handler, ListenerId, MessageBus};
use crate::notification::{FileOpener, OverlayHost, OverlaySpec, WorkArea};
use crate::window::{LoadTarget, MainWindowBackend, WindowSpec};

// ============================================================================
// BUS
// ============================================================================

#[derive(Default)]
struct BusInner {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Channel, Handler)>,
    published: Vec<(Channel, Value)>,
}

/// Synchronous bus: handlers run on the publishing thread.
#[derive(Default)]
pub struct MemoryBus {
    inner: Mutex<BusInner>,
}

impl MemoryBus {
    pub fn listener_count(&self, channel: Channel) -> usize {
        self.inner
            .lock()
            .expect("bus lock poisoned")
            .listeners
            .iter()
            .filter(|(_, listened, _)| *listened == channel)
            .count()
    }

    pub fn published(&self, channel: Channel) -> Vec<Value> {
        self.inner
            .lock()
            .expect("bus lock poisoned")
            .published
            .iter()
            .filter(|(sent, _)| *sent == channel)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl MessageBus for MemoryBus {
    fn publish_value(&self, channel: Channel, payload: Value) -> Result<(), BusError> {
        let handlers = {
            let mut inner = self.inner.lock().expect("bus lock poisoned");
            inner.published.push((channel, payload.clone()));
            inner
                .listeners
                .iter()
                .filter(|(_, listened, _)| *listened == channel)
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect::<Vec<_>>()
        };
        for handler in handlers {
            handler(payload.clone());
        }
        Ok(())
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> ListenerId {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.push((id, channel, handler));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.inner
            .lock()
            .expect("bus lock poisoned")
            .listeners
            .retain(|(listener, _, _)| *listener != id);
    }
}

// ============================================================================
// MAIN WINDOW
// ============================================================================

#[derive(Default)]
struct WindowsInner {
    windows: HashMap<String, bool>,
    minimized: bool,
    failing_targets: Vec<String>,
    targets: Vec<LoadTarget>,
    calls: Vec<String>,
}

/// Records window operations; clones share state.
#[derive(Clone, Default)]
pub struct MockMainWindowBackend {
    inner: Arc<Mutex<WindowsInner>>,
}

impl MockMainWindowBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail builds whose target description starts with any of `prefixes`.
    pub fn fail_builds_for(&self, prefixes: &[&str]) {
        self.lock().failing_targets = prefixes.iter().map(|p| p.to_string()).collect();
    }

    pub fn build_attempts(&self) -> usize {
        self.lock().targets.len()
    }

    pub fn last_target(&self) -> Option<LoadTarget> {
        self.lock().targets.last().cloned()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|entry| entry.as_str() == operation)
            .count()
    }

    pub fn remove(&self, label: &str) {
        self.lock().windows.remove(label);
    }

    pub fn insert(&self, label: &str) {
        self.lock().windows.insert(label.to_string(), true);
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.lock().minimized = minimized;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowsInner> {
        self.inner.lock().expect("windows lock poisoned")
    }

    fn record(&self, operation: &str, label: &str) -> Result<(), String> {
        let mut inner = self.lock();
        inner.calls.push(operation.to_string());
        if inner.windows.contains_key(label) {
            Ok(())
        } else {
            Err(format!("window '{label}' not found"))
        }
    }

    fn set_visible(&self, label: &str, visible: bool) {
        if let Some(entry) = self.lock().windows.get_mut(label) {
            *entry = visible;
        }
    }
}

impl MainWindowBackend for MockMainWindowBackend {
    fn exists(&self, label: &str) -> bool {
        self.lock().windows.contains_key(label)
    }

    fn build(&self, label: &str, _spec: &WindowSpec, target: &LoadTarget) -> Result<(), String> {
        let mut inner = self.lock();
        inner.targets.push(target.clone());
        let description = target.to_string();
        if inner
            .failing_targets
            .iter()
            .any(|prefix| description.starts_with(prefix.as_str()))
        {
            return Err(format!("{description} unavailable"));
        }
        inner.windows.insert(label.to_string(), true);
        Ok(())
    }

    fn is_visible(&self, label: &str) -> Result<bool, String> {
        self.lock()
            .windows
            .get(label)
            .copied()
            .ok_or_else(|| format!("window '{label}' not found"))
    }

    fn is_minimized(&self, _label: &str) -> Result<bool, String> {
        Ok(self.lock().minimized)
    }

    fn unminimize(&self, label: &str) -> Result<(), String> {
        self.record("unminimize", label)?;
        self.lock().minimized = false;
        Ok(())
    }

    fn show(&self, label: &str) -> Result<(), String> {
        self.record("show", label)?;
        self.set_visible(label, true);
        Ok(())
    }

    fn hide(&self, label: &str) -> Result<(), String> {
        self.record("hide", label)?;
        self.set_visible(label, false);
        Ok(())
    }

    fn set_focus(&self, label: &str) -> Result<(), String> {
        self.record("set_focus", label)
    }

    fn destroy(&self, label: &str) -> Result<(), String> {
        self.record("destroy", label)?;
        self.remove(label);
        Ok(())
    }
}

// ============================================================================
// SHELL
// ============================================================================

/// Records reveal/open calls as `reveal:{path}` and `open:{path}`.
#[derive(Clone, Default)]
pub struct MockOpener {
    fail_reveal: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockOpener {
    pub fn failing_reveal() -> Self {
        Self {
            fail_reveal: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("opener lock poisoned").clone()
    }
}

impl FileOpener for MockOpener {
    fn reveal(&self, path: &Path) -> Result<(), String> {
        if self.fail_reveal {
            return Err("reveal refused".to_string());
        }
        self.calls
            .lock()
            .expect("opener lock poisoned")
            .push(format!("reveal:{}", path.display()));
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<(), String> {
        self.calls
            .lock()
            .expect("opener lock poisoned")
            .push(format!("open:{}", path.display()));
        Ok(())
    }
}

// ============================================================================
// OVERLAY HOST
// ============================================================================

struct OverlayInner {
    work_area: Option<WorkArea>,
    open: HashSet<String>,
    calls: Vec<String>,
    last_script: Option<String>,
    last_position: Option<(i32, i32)>,
    system_notifications: Vec<String>,
}

/// Overlay host double; clones share state.
#[derive(Clone)]
pub struct MockOverlayHost {
    template: bool,
    fail_create: bool,
    fail_render: bool,
    fail_system_notify: bool,
    inner: Arc<Mutex<OverlayInner>>,
    opener: MockOpener,
    windows: MockMainWindowBackend,
}

impl MockOverlayHost {
    pub fn new() -> Self {
        Self {
            template: true,
            fail_create: false,
            fail_render: false,
            fail_system_notify: false,
            inner: Arc::new(Mutex::new(OverlayInner {
                work_area: Some(WorkArea {
                    x: 0,
                    y: 0,
                    width: 1920,
                    height: 1040,
                }),
                open: HashSet::new(),
                calls: Vec::new(),
                last_script: None,
                last_position: None,
                system_notifications: Vec::new(),
            })),
            opener: MockOpener::default(),
            windows: MockMainWindowBackend::new(),
        }
    }

    pub fn without_template(mut self) -> Self {
        self.template = false;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn failing_system_notify(mut self) -> Self {
        self.fail_system_notify = true;
        self
    }

    pub fn set_work_area(&self, work_area: Option<WorkArea>) {
        self.lock().work_area = work_area;
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|entry| entry.as_str() == operation)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn last_script(&self) -> Option<String> {
        self.lock().last_script.clone()
    }

    pub fn last_position(&self) -> Option<(i32, i32)> {
        self.lock().last_position
    }

    pub fn system_notifications(&self) -> Vec<String> {
        self.lock().system_notifications.clone()
    }

    pub fn opener_calls(&self) -> Vec<String> {
        self.opener.calls()
    }

    pub fn windows_mock(&self) -> MockMainWindowBackend {
        self.windows.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OverlayInner> {
        self.inner.lock().expect("overlay lock poisoned")
    }

    fn record(&self, operation: &str, label: &str) -> Result<(), String> {
        let mut inner = self.lock();
        inner.calls.push(operation.to_string());
        if inner.open.contains(label) {
            Ok(())
        } else {
            Err(format!("overlay '{label}' not found"))
        }
    }
}

impl FileOpener for MockOverlayHost {
    fn reveal(&self, path: &Path) -> Result<(), String> {
        self.opener.reveal(path)
    }

    fn open(&self, path: &Path) -> Result<(), String> {
        self.opener.open(path)
    }
}

impl OverlayHost for MockOverlayHost {
    fn template_available(&self) -> bool {
        self.template
    }

    fn create_overlay(&self, label: &str, _spec: &OverlaySpec) -> Result<(), String> {
        let mut inner = self.lock();
        inner.calls.push("create_overlay".to_string());
        if self.fail_create {
            return Err("window creation refused".to_string());
        }
        inner.open.insert(label.to_string());
        Ok(())
    }

    fn primary_work_area(&self) -> Result<Option<WorkArea>, String> {
        Ok(self.lock().work_area)
    }

    fn set_position(&self, label: &str, x: i32, y: i32) -> Result<(), String> {
        self.record("set_position", label)?;
        self.lock().last_position = Some((x, y));
        Ok(())
    }

    fn render(&self, label: &str, script: &str) -> Result<(), String> {
        self.record("render", label)?;
        if self.fail_render {
            return Err("script evaluation failed".to_string());
        }
        self.lock().last_script = Some(script.to_string());
        Ok(())
    }

    fn show(&self, label: &str) -> Result<(), String> {
        self.record("show", label)
    }

    fn close(&self, label: &str) -> Result<(), String> {
        self.record("close", label)?;
        self.lock().open.remove(label);
        Ok(())
    }

    fn system_notify(&self, _title: &str, body: &str) -> Result<(), String> {
        if self.fail_system_notify {
            return Err("notification service unavailable".to_string());
        }
        self.lock().system_notifications.push(body.to_string());
        Ok(())
    }

    fn windows(&self) -> &dyn MainWindowBackend {
        &self.windows
    }

    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        self.lock().calls.push("dispatch".to_string());
        task();
    }
}
