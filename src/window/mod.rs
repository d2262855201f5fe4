pub mod locator;

pub use locator::{rank_windows, TargetApp};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Opaque OS window handle (HWND on Windows, X11 window id elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Snapshot of one top-level window. Never cached across ticks: minimize and
/// restore happen behind our back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDescriptor {
    pub handle: WindowHandle,
    pub title: String,
    pub process_id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub is_minimized: bool,
    pub is_visible: bool,
}

impl WindowDescriptor {
    pub fn center(&self) -> (i64, i64) {
        (
            self.x as i64 + self.width as i64 / 2,
            self.y as i64 + self.height as i64 / 2,
        )
    }

    /// Minimized windows often report zero or negative sizes.
    pub fn has_degenerate_geometry(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

pub trait WindowLocator: Send + Sync {
    /// Windows whose title contains any of `variants` (case-insensitive).
    /// An empty result means the application is not running.
    fn find_windows(&self, variants: &BTreeSet<String>) -> Result<Vec<WindowDescriptor>>;
}

/// Lower-cased spellings of `title` that tolerate casing and spacing drift,
/// e.g. "Dota 2" yields "dota 2" and "dota2".
pub fn title_variants(title: &str) -> BTreeSet<String> {
    let lower = title.trim().to_lowercase();
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    let squashed: String = lower.chars().filter(|c| !c.is_whitespace()).collect();

    [lower, collapsed, squashed]
        .into_iter()
        .filter(|variant| !variant.is_empty())
        .collect()
}

pub fn title_matches(window_title: &str, variants: &BTreeSet<String>) -> bool {
    let lower = window_title.to_lowercase();
    let squashed: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    variants
        .iter()
        .any(|variant| lower.contains(variant.as_str()) || squashed.contains(variant.as_str()))
}
