//! OS backends behind the component traits.

#[cfg(windows)]
mod win32;
#[cfg(feature = "screen-capture")]
mod xcap_backend;
#[cfg(not(windows))]
mod xdotool;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::actions::InputInjector;
use crate::capture::{PixelBuffer, ScreenCapture};
use crate::display::{MonitorDescriptor, MonitorRegistry};
use crate::errors::{Error, Result};
use crate::focus::FocusBackend;
use crate::window::{WindowDescriptor, WindowLocator};

/// One handle per OS-facing component.
#[derive(Clone)]
pub struct NativeBackends {
    pub monitors: Arc<dyn MonitorRegistry>,
    pub capture: Arc<dyn ScreenCapture>,
    pub windows: Arc<dyn WindowLocator>,
    pub focus: Arc<dyn FocusBackend>,
    pub input: Arc<dyn InputInjector>,
}

pub fn native() -> NativeBackends {
    #[cfg(feature = "screen-capture")]
    let (monitors, capture, windows): (
        Arc<dyn MonitorRegistry>,
        Arc<dyn ScreenCapture>,
        Arc<dyn WindowLocator>,
    ) = (
        Arc::new(xcap_backend::XcapMonitors),
        Arc::new(xcap_backend::XcapCapture),
        Arc::new(xcap_backend::XcapWindows),
    );
    #[cfg(not(feature = "screen-capture"))]
    let (monitors, capture, windows): (
        Arc<dyn MonitorRegistry>,
        Arc<dyn ScreenCapture>,
        Arc<dyn WindowLocator>,
    ) = (
        Arc::new(NoCapture),
        Arc::new(NoCapture),
        Arc::new(NoCapture),
    );

    #[cfg(windows)]
    let (focus, input): (Arc<dyn FocusBackend>, Arc<dyn InputInjector>) =
        (Arc::new(win32::Win32Focus), Arc::new(win32::Win32Input));
    #[cfg(not(windows))]
    let (focus, input): (Arc<dyn FocusBackend>, Arc<dyn InputInjector>) =
        (Arc::new(xdotool::XdotoolFocus), Arc::new(xdotool::XdotoolInput));

    NativeBackends {
        monitors,
        capture,
        windows,
        focus,
        input,
    }
}

/// Stand-in when the crate is built without screen capture support.
#[cfg_attr(feature = "screen-capture", allow(dead_code))]
#[derive(Debug, Default, Clone, Copy)]
struct NoCapture;

impl MonitorRegistry for NoCapture {
    fn list_monitors(&self) -> Result<Vec<MonitorDescriptor>> {
        Err(Error::Unsupported("monitor enumeration"))
    }
}

impl ScreenCapture for NoCapture {
    fn capture(&self, _region: &MonitorDescriptor) -> Result<PixelBuffer> {
        Err(Error::Unsupported("screen capture"))
    }
}

impl WindowLocator for NoCapture {
    fn find_windows(&self, _variants: &BTreeSet<String>) -> Result<Vec<WindowDescriptor>> {
        Ok(Vec::new())
    }
}
