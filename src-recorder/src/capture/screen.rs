//! Screen capture using the `xcap` crate.
//!
//! A region inside one monitor is grabbed directly. A region extending past
//! the monitor containing its top-left corner is cut from a full monitor
//! grab, and the parts outside that monitor are recorded as black.

use super::convert::{crop_rgba_to_rgb, rgba_to_rgb, ImageLayout};
use super::{CaptureBackend, DisplayInfo, Frame, FrameSource};
use crate::error::{CaptureError, EnumerationError};
use reelcap_common::{CaptureRegion, MonitorInfo, WindowInfo};
use tracing::{debug, trace, warn};
use xcap::{Monitor, Window};

/// Enumerates monitors and windows through `xcap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenDisplays;

impl DisplayInfo for ScreenDisplays {
    fn monitors(&self) -> Result<Vec<MonitorInfo>, EnumerationError> {
        let monitors = Monitor::all().map_err(|e| EnumerationError(e.to_string()))?;

        let mut result = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let info = (|| -> xcap::XCapResult<MonitorInfo> {
                Ok(MonitorInfo {
                    id: monitor.id()?,
                    name: monitor.name()?,
                    x: monitor.x()?,
                    y: monitor.y()?,
                    width: monitor.width()?,
                    height: monitor.height()?,
                    is_primary: monitor.is_primary().unwrap_or(false),
                })
            })();

            match info {
                Ok(info) => result.push(info),
                Err(e) => debug!("Skipping monitor with unreadable properties: {}", e),
            }
        }

        Ok(result)
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, EnumerationError> {
        let windows = Window::all().map_err(|e| EnumerationError(e.to_string()))?;

        let result = windows
            .into_iter()
            .filter(|w| !w.is_minimized().unwrap_or(false))
            .filter_map(|w| {
                Some(WindowInfo {
                    id: w.id().ok()?,
                    title: w.title().ok()?,
                    app_name: w.app_name().unwrap_or_default(),
                    x: w.x().ok()?,
                    y: w.y().ok()?,
                    width: w.width().ok()?,
                    height: w.height().ok()?,
                })
            })
            .filter(|w| !w.title.is_empty() && w.width > 0 && w.height > 0)
            .collect();

        Ok(result)
    }
}

/// Opens [`ScreenFrameSource`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenCaptureBackend;

impl CaptureBackend for ScreenCaptureBackend {
    fn open(&self, region: &CaptureRegion) -> Result<Box<dyn FrameSource>, CaptureError> {
        if region.is_empty() {
            return Err(CaptureError::InvalidRegion(format!("{} is empty", region)));
        }

        // Off-screen regions fail here, not per frame
        let monitor = Monitor::from_point(region.left, region.top).map_err(|e| {
            CaptureError::TargetNotFound(format!("no monitor at ({}, {}): {}", region.left, region.top, e))
        })?;
        let origin = (
            monitor.x().map_err(|e| CaptureError::PlatformError(e.to_string()))?,
            monitor.y().map_err(|e| CaptureError::PlatformError(e.to_string()))?,
        );

        debug!(region = %region, ?origin, "Opened screen frame source");
        Ok(Box::new(ScreenFrameSource {
            region: *region,
            failures: 0,
        }))
    }
}

/// Captures a fixed region of the screen.
///
/// The monitor handle is looked up on every capture instead of being held,
/// so the source stays `Send` on every platform.
pub struct ScreenFrameSource {
    region: CaptureRegion,
    failures: u64,
}

impl ScreenFrameSource {
    fn grab(&self) -> Result<Frame, CaptureError> {
        let region = self.region;
        let monitor = Monitor::from_point(region.left, region.top)
            .map_err(|e| CaptureError::TargetNotFound(e.to_string()))?;
        let mon_x = monitor
            .x()
            .map_err(|e| CaptureError::PlatformError(e.to_string()))?;
        let mon_y = monitor
            .y()
            .map_err(|e| CaptureError::PlatformError(e.to_string()))?;
        let mon_size = (
            monitor
                .width()
                .map_err(|e| CaptureError::PlatformError(e.to_string()))?,
            monitor
                .height()
                .map_err(|e| CaptureError::PlatformError(e.to_string()))?,
        );

        let x = (region.left - mon_x).max(0) as u32;
        let y = (region.top - mon_y).max(0) as u32;

        let rgb = if fits_within(x, y, &region, mon_size) {
            let image = monitor
                .capture_region(x, y, region.width, region.height)
                .map_err(|e| CaptureError::PlatformError(e.to_string()))?;
            rgba_to_rgb(image.as_raw())
        } else {
            let image = monitor
                .capture_image()
                .map_err(|e| CaptureError::PlatformError(e.to_string()))?;
            let layout = ImageLayout::packed(image.width(), image.height());
            crop_rgba_to_rgb(image.as_raw(), layout, x, y, region.width, region.height)
        };

        Frame::from_rgb(region.width, region.height, rgb).ok_or_else(|| {
            CaptureError::PlatformError("cropped frame has unexpected length".to_string())
        })
    }
}

/// Whether `region`, placed at monitor-relative `(x, y)`, lies inside a
/// monitor of size `(width, height)`.
fn fits_within(x: u32, y: u32, region: &CaptureRegion, (width, height): (u32, u32)) -> bool {
    x.checked_add(region.width).is_some_and(|right| right <= width)
        && y.checked_add(region.height).is_some_and(|bottom| bottom <= height)
}

impl FrameSource for ScreenFrameSource {
    fn capture(&mut self) -> Option<Frame> {
        match self.grab() {
            Ok(frame) => {
                trace!("Captured {}x{} frame", frame.width(), frame.height());
                Some(frame)
            }
            Err(e) => {
                self.failures += 1;
                // First failure, then every 100th
                if self.failures == 1 || self.failures % 100 == 0 {
                    warn!(failures = self.failures, "Frame capture failed: {}", e);
                }
                None
            }
        }
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_inside_the_monitor_fit() {
        let region = CaptureRegion::new(0, 0, 800, 600);
        assert!(fits_within(0, 0, &region, (1920, 1080)));
        assert!(fits_within(1120, 480, &region, (1920, 1080)));
    }

    #[test]
    fn regions_crossing_the_monitor_edge_do_not_fit() {
        let region = CaptureRegion::new(0, 0, 800, 600);
        assert!(!fits_within(1121, 0, &region, (1920, 1080)));
        assert!(!fits_within(0, 481, &region, (1920, 1080)));
        assert!(!fits_within(u32::MAX, 0, &region, (1920, 1080)));
    }
}
