//! Console window placement.
//!
//! Pure geometry: the window controls report monitors and sizes, this module
//! decides where the console goes.
//!
//! ```text
//! work area origin (100,100), size 1000x800
//! console size 400x300
//! top-left = (100 + (1000-400)/2, 100 + (800-300)/2) = (400, 350)
//! ```

use serde::{Deserialize, Serialize};

/// Raw handle of the owning application's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerWindow(pub isize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn right(&self) -> i32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> i32 {
        self.origin.y + self.size.height
    }
}

/// A monitor's full bounds and its usable work area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    pub bounds: Rect,
    /// Bounds minus taskbars and other reserved system UI
    pub work_area: Rect,
}

/// Where the console is placed when shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsolePositionMode {
    #[default]
    Default,
    FollowOwnerWindow,
    SpecificMonitor,
}

/// Top-left corner that centers `window` inside the monitor's work area,
/// kept inside the monitor bounds.
pub fn center_on_monitor(monitor: &MonitorInfo, window: Size) -> Point {
    let work = monitor.work_area;
    let x = work.origin.x + (work.size.width - window.width) / 2;
    let y = work.origin.y + (work.size.height - window.height) / 2;
    clamp_to(monitor.bounds, window, Point::new(x, y))
}

fn clamp_to(bounds: Rect, window: Size, p: Point) -> Point {
    // A window larger than the monitor pins to the monitor origin
    let max_x = (bounds.right() - window.width).max(bounds.origin.x);
    let max_y = (bounds.bottom() - window.height).max(bounds.origin.y);
    Point::new(
        p.x.clamp(bounds.origin.x, max_x),
        p.y.clamp(bounds.origin.y, max_y),
    )
}

/// Pick a monitor by index, falling back to the first one
pub fn monitor_at(monitors: &[MonitorInfo], index: usize) -> Option<&MonitorInfo> {
    monitors.get(index).or_else(|| monitors.first())
}
