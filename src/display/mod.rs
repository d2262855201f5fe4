pub mod resolver;

pub use resolver::{resolve, resolve_or_primary};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A physical display and its rectangle in virtual-desktop pixel space.
///
/// `index` is 1-based; 0 is the combined virtual desktop and is never handed
/// out. Descriptors only live for one enumeration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorDescriptor {
    pub index: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub is_primary: bool,
}

impl MonitorDescriptor {
    /// Half-open containment: left/top edges are inside, right/bottom are not.
    pub fn contains(&self, px: i64, py: i64) -> bool {
        let (x, y) = (self.x as i64, self.y as i64);
        px >= x && px < x + self.width as i64 && py >= y && py < y + self.height as i64
    }

    pub fn overlaps(&self, other: &MonitorDescriptor) -> bool {
        let (ax0, ay0) = (self.x as i64, self.y as i64);
        let (ax1, ay1) = (ax0 + self.width as i64, ay0 + self.height as i64);
        let (bx0, by0) = (other.x as i64, other.y as i64);
        let (bx1, by1) = (bx0 + other.width as i64, by0 + other.height as i64);
        ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Bounds as reported by the OS, before filtering and indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMonitor {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub is_primary: bool,
}

pub trait MonitorRegistry: Send + Sync {
    /// Physical monitors in enumeration order, excluding the virtual desktop.
    fn list_monitors(&self) -> Result<Vec<MonitorDescriptor>>;
}

/// Turns one OS enumeration into indexed descriptors.
///
/// Zero-sized entries and outputs overlapping an earlier one (mirrored
/// displays) are dropped so that no two descriptors share a pixel.
pub fn index_monitors(raw: &[RawMonitor]) -> Result<Vec<MonitorDescriptor>> {
    let mut monitors: Vec<MonitorDescriptor> = Vec::with_capacity(raw.len());

    for entry in raw {
        if entry.width <= 0 || entry.height <= 0 {
            warn!("ignoring monitor with empty bounds: {entry:?}");
            continue;
        }

        let candidate = MonitorDescriptor {
            index: monitors.len() as u32 + 1,
            x: entry.x,
            y: entry.y,
            width: entry.width,
            height: entry.height,
            is_primary: entry.is_primary,
        };

        if let Some(existing) = monitors.iter().find(|m| m.overlaps(&candidate)) {
            warn!(
                "monitor at ({}, {}) {}x{} overlaps monitor {}; treating it as a mirror",
                entry.x, entry.y, entry.width, entry.height, existing.index
            );
            continue;
        }

        monitors.push(candidate);
    }

    if monitors.is_empty() {
        return Err(Error::NoMonitorsFound);
    }

    Ok(monitors)
}

pub fn find_monitor(monitors: &[MonitorDescriptor], index: u32) -> Option<MonitorDescriptor> {
    monitors.iter().copied().find(|m| m.index == index)
}
