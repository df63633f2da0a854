//! Display geometry watcher.
//!
//! The runtime exposes monitors but no change notification, so the primary
//! work area is sampled periodically and changes are published as
//! `display-metrics-changed`.

use std::sync::Arc;
use std::time::Duration;

use tauri::AppHandle;

use crate::bus::{self, Channel, DisplayMetricsChanged, MessageBus};
use crate::notification::WorkArea;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Remembers the last observed work area.
#[derive(Debug, Default)]
pub struct GeometryTracker {
    last: Option<WorkArea>,
}

impl GeometryTracker {
    /// Record `current`; returns it when it differs from a previous sample.
    ///
    /// The first sample only establishes a baseline. A missing monitor is
    /// ignored so a transient query failure does not look like a change.
    pub fn observe(&mut self, current: Option<WorkArea>) -> Option<WorkArea> {
        let current = current?;
        match self.last.replace(current) {
            Some(previous) if previous != current => Some(current),
            _ => None,
        }
    }
}

/// Poll the primary monitor and publish work-area changes on `bus`.
pub fn spawn_display_watcher<B: MessageBus + 'static>(app: AppHandle, bus: Arc<B>) {
    tauri::async_runtime::spawn(async move {
        let mut tracker = GeometryTracker::default();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        log::info!("Display watcher started");

        loop {
            ticker.tick().await;
            let sample = match app.primary_monitor() {
                Ok(monitor) => monitor.as_ref().map(WorkArea::from_tauri_monitor),
                Err(e) => {
                    log::debug!("Primary monitor query failed: {}", e);
                    None
                }
            };

            if let Some(work_area) = tracker.observe(sample) {
                log::info!(
                    "Work area changed to {}x{} at ({}, {})",
                    work_area.width,
                    work_area.height,
                    work_area.x,
                    work_area.y
                );
                if let Err(e) = bus::publish(
                    &*bus,
                    Channel::DisplayMetricsChanged,
                    &DisplayMetricsChanged { work_area },
                ) {
                    log::warn!("Failed to publish display change: {}", e);
                }
            }
        }
    });
}
