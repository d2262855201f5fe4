use super::{find_monitor, MonitorDescriptor};
use crate::window::WindowDescriptor;

/// Index used when the window's center is off every monitor.
pub const FALLBACK_MONITOR: u32 = 1;

/// Monitor hosting the center of `window`.
///
/// The first monitor in enumeration order containing the center wins; no
/// overlap-area comparison is attempted for windows spanning two screens.
/// Centers outside every monitor (minimized windows report off-screen
/// coordinates) fall back to monitor 1. `None` only when `monitors` has no
/// monitor 1 at all.
pub fn resolve(
    window: &WindowDescriptor,
    monitors: &[MonitorDescriptor],
) -> Option<MonitorDescriptor> {
    let (cx, cy) = window.center();
    monitors
        .iter()
        .copied()
        .find(|monitor| monitor.contains(cx, cy))
        .or_else(|| find_monitor(monitors, FALLBACK_MONITOR))
}

/// Like [`resolve`], but also covers the "target not running" case.
pub fn resolve_or_primary(
    window: Option<&WindowDescriptor>,
    monitors: &[MonitorDescriptor],
) -> Option<MonitorDescriptor> {
    match window {
        Some(window) => resolve(window, monitors),
        None => find_monitor(monitors, FALLBACK_MONITOR),
    }
}
