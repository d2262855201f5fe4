//! Monitors, screen grabs and window enumeration through `xcap`.

use std::collections::BTreeSet;

use log::debug;
use xcap::{Monitor, Window};

use crate::capture::{strip_alpha, PixelBuffer, ScreenCapture};
use crate::display::{index_monitors, MonitorDescriptor, MonitorRegistry, RawMonitor};
use crate::errors::{Error, Result};
use crate::window::{title_matches, WindowDescriptor, WindowHandle, WindowLocator};

#[derive(Debug, Default, Clone, Copy)]
pub struct XcapMonitors;

impl XcapMonitors {
    fn raw_monitors() -> Result<Vec<(RawMonitor, Monitor)>> {
        let monitors = Monitor::all().map_err(|e| Error::CaptureFailed(e.to_string()))?;

        let mut raw: Vec<(RawMonitor, Monitor)> = monitors
            .into_iter()
            .filter_map(|monitor| {
                let bounds = RawMonitor {
                    x: monitor.x().ok()?,
                    y: monitor.y().ok()?,
                    width: i32::try_from(monitor.width().ok()?).ok()?,
                    height: i32::try_from(monitor.height().ok()?).ok()?,
                    is_primary: monitor.is_primary().unwrap_or(false),
                };
                Some((bounds, monitor))
            })
            .collect();

        // primary first so that index 1 is always the primary display
        raw.sort_by_key(|(bounds, _)| !bounds.is_primary);
        Ok(raw)
    }
}

impl MonitorRegistry for XcapMonitors {
    fn list_monitors(&self) -> Result<Vec<MonitorDescriptor>> {
        let raw: Vec<RawMonitor> = Self::raw_monitors()?
            .into_iter()
            .map(|(bounds, _)| bounds)
            .collect();
        index_monitors(&raw)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapture;

impl ScreenCapture for XcapCapture {
    fn capture(&self, region: &MonitorDescriptor) -> Result<PixelBuffer> {
        // the xcap handle owns the OS capture context and releases it on drop
        let monitor = XcapMonitors::raw_monitors()?
            .into_iter()
            .find(|(bounds, _)| {
                bounds.x == region.x
                    && bounds.y == region.y
                    && bounds.width == region.width
                    && bounds.height == region.height
            })
            .map(|(_, monitor)| monitor)
            .ok_or(Error::MonitorNotFound(region.index))?;

        let image = monitor
            .capture_image()
            .map_err(|e| Error::CaptureFailed(e.to_string()))?;
        debug!(
            "captured monitor {} ({}x{})",
            region.index,
            image.width(),
            image.height()
        );
        Ok(strip_alpha(image))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XcapWindows;

impl WindowLocator for XcapWindows {
    fn find_windows(&self, variants: &BTreeSet<String>) -> Result<Vec<WindowDescriptor>> {
        let windows = Window::all().map_err(|e| Error::WindowEnumeration(e.to_string()))?;

        Ok(windows
            .iter()
            .filter_map(|window| {
                let title = window.title().ok()?;
                if !title_matches(&title, variants) {
                    return None;
                }
                Some(describe(window, title))
            })
            .collect())
    }
}

fn describe(window: &Window, title: String) -> WindowDescriptor {
    let is_minimized = window.is_minimized().unwrap_or(false);
    WindowDescriptor {
        handle: WindowHandle(window.id().map(u64::from).unwrap_or(0)),
        title,
        process_id: window.pid().unwrap_or(0),
        x: window.x().unwrap_or(0),
        y: window.y().unwrap_or(0),
        width: window.width().ok().and_then(|w| i32::try_from(w).ok()).unwrap_or(0),
        height: window.height().ok().and_then(|h| i32::try_from(h).ok()).unwrap_or(0),
        is_minimized,
        is_visible: !is_minimized,
    }
}
