use serde::{Deserialize, Serialize};

/// Usable area of a monitor in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WorkArea {
    pub fn from_tauri_monitor(monitor: &tauri::Monitor) -> Self {
        let work_area = monitor.work_area();
        Self {
            x: work_area.position.x,
            y: work_area.position.y,
            width: work_area.size.width,
            height: work_area.size.height,
        }
    }
}

/// Overlay size and its gap to the bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlacement {
    pub width: u32,
    pub height: u32,
    pub margin_x: i32,
    pub margin_y: i32,
}

/// Top-left corner for an overlay anchored bottom-right in `work_area`.
pub fn compute_overlay_position(work_area: &WorkArea, placement: OverlayPlacement) -> (i32, i32) {
    let work_width = work_area.width as i32;
    let work_height = work_area.height as i32;
    let margin_x = placement.margin_x.max(0);
    let margin_y = placement.margin_y.max(0);

    let x = work_area.x + work_width - placement.width as i32 - margin_x;
    let y = work_area.y + work_height - placement.height as i32 - margin_y;

    (x.max(work_area.x), y.max(work_area.y))
}
