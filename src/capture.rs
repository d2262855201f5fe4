use image::{DynamicImage, RgbImage, RgbaImage};

use crate::display::MonitorDescriptor;
use crate::errors::Result;

/// Captured frames are always 8-bit RGB, whatever the native grab format.
pub type PixelBuffer = RgbImage;

pub trait ScreenCapture: Send + Sync {
    /// Grabs the pixels inside `region`.
    ///
    /// Failures are `Error::CaptureFailed` and are transient: the caller
    /// retries on the next tick. Any OS capture context must be released
    /// before returning, on success and failure alike.
    fn capture(&self, region: &MonitorDescriptor) -> Result<PixelBuffer>;
}

/// Drops the alpha channel of a native grab.
pub fn strip_alpha(image: RgbaImage) -> PixelBuffer {
    DynamicImage::ImageRgba8(image).to_rgb8()
}
