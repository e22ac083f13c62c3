//! Capture region resolution.
//!
//! A [`CaptureTarget`] is turned into a fixed [`CaptureRegion`] once, when a
//! session starts. Windows that move afterwards are not followed.

use super::DisplayInfo;
use crate::error::CaptureError;
use reelcap_common::{CaptureRegion, CaptureTarget, MonitorInfo, MIN_REGION_SIZE};
use tracing::{debug, warn};

/// Resolve a capture target against the host's displays.
///
/// The returned region always has even, non-zero width and height.
pub fn resolve_region(
    target: &CaptureTarget,
    displays: &dyn DisplayInfo,
) -> Result<CaptureRegion, CaptureError> {
    let region = match target {
        CaptureTarget::FullScreen { monitor } => {
            let monitor = find_monitor(displays, *monitor)?;
            monitor_region(&monitor)
        }
        CaptureTarget::Window { id } => window_region(displays, *id)?,
        CaptureTarget::Region {
            left,
            top,
            width,
            height,
        } => {
            if *width < MIN_REGION_SIZE || *height < MIN_REGION_SIZE {
                return Err(CaptureError::InvalidRegion(format!(
                    "{}x{} is smaller than the {}x{} minimum",
                    width, height, MIN_REGION_SIZE, MIN_REGION_SIZE
                )));
            }
            CaptureRegion::new(*left, *top, *width, *height)
        }
    };

    let even = region.to_even();
    if even.is_empty() {
        return Err(CaptureError::InvalidRegion(format!(
            "{} has no capturable area",
            region
        )));
    }

    debug!(target = ?target.mode(), region = %even, "Resolved capture region");
    Ok(even)
}

fn monitor_region(monitor: &MonitorInfo) -> CaptureRegion {
    CaptureRegion::new(monitor.x, monitor.y, monitor.width, monitor.height)
}

fn find_monitor(displays: &dyn DisplayInfo, id: Option<u32>) -> Result<MonitorInfo, CaptureError> {
    let monitors = displays
        .monitors()
        .map_err(|e| CaptureError::PlatformError(e.to_string()))?;

    let found = match id {
        Some(id) => monitors.iter().find(|m| m.id == id),
        None => monitors
            .iter()
            .find(|m| m.is_primary)
            .or_else(|| monitors.first()),
    };

    found.cloned().ok_or_else(|| match id {
        Some(id) => CaptureError::TargetNotFound(format!("monitor {}", id)),
        None => CaptureError::TargetNotFound("no monitors connected".to_string()),
    })
}

fn window_region(displays: &dyn DisplayInfo, id: u32) -> Result<CaptureRegion, CaptureError> {
    let window = match displays.windows() {
        Ok(windows) => windows.into_iter().find(|w| w.id == id),
        Err(e) => {
            warn!("Window enumeration failed: {}", e);
            None
        }
    };

    match window {
        Some(w) if w.width > 0 && w.height > 0 => {
            Ok(CaptureRegion::new(w.x, w.y, w.width, w.height))
        }
        Some(_) => {
            warn!(window = id, "Window has an empty rectangle, recording primary monitor");
            find_monitor(displays, None).map(|m| monitor_region(&m))
        }
        None => {
            warn!(window = id, "Window not found, recording primary monitor");
            find_monitor(displays, None).map(|m| monitor_region(&m))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnumerationError;
    use reelcap_common::WindowInfo;

    struct FakeDisplays {
        monitors: Vec<MonitorInfo>,
        windows: Vec<WindowInfo>,
    }

    impl DisplayInfo for FakeDisplays {
        fn monitors(&self) -> Result<Vec<MonitorInfo>, EnumerationError> {
            Ok(self.monitors.clone())
        }

        fn windows(&self) -> Result<Vec<WindowInfo>, EnumerationError> {
            Ok(self.windows.clone())
        }
    }

    fn displays() -> FakeDisplays {
        FakeDisplays {
            monitors: vec![
                MonitorInfo {
                    id: 1,
                    name: "Left".to_string(),
                    x: -1920,
                    y: 0,
                    width: 1920,
                    height: 1080,
                    is_primary: false,
                },
                MonitorInfo {
                    id: 2,
                    name: "Main".to_string(),
                    x: 0,
                    y: 0,
                    width: 2560,
                    height: 1440,
                    is_primary: true,
                },
            ],
            windows: vec![
                WindowInfo {
                    id: 42,
                    title: "Editor".to_string(),
                    app_name: "edit".to_string(),
                    x: 100,
                    y: 50,
                    width: 801,
                    height: 601,
                },
                WindowInfo {
                    id: 7,
                    title: "Minimized".to_string(),
                    app_name: "app".to_string(),
                    x: 0,
                    y: 0,
                    width: 0,
                    height: 0,
                },
            ],
        }
    }

    #[test]
    fn full_screen_defaults_to_primary() {
        let region = resolve_region(&CaptureTarget::FullScreen { monitor: None }, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(0, 0, 2560, 1440));
    }

    #[test]
    fn full_screen_by_id() {
        let region =
            resolve_region(&CaptureTarget::FullScreen { monitor: Some(1) }, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(-1920, 0, 1920, 1080));
    }

    #[test]
    fn unknown_monitor_is_an_error() {
        let err = resolve_region(&CaptureTarget::FullScreen { monitor: Some(9) }, &displays());
        assert!(matches!(err, Err(CaptureError::TargetNotFound(_))));
    }

    #[test]
    fn window_bounds_are_rounded_to_even() {
        let region = resolve_region(&CaptureTarget::Window { id: 42 }, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(100, 50, 800, 600));
    }

    #[test]
    fn missing_window_falls_back_to_primary() {
        let region = resolve_region(&CaptureTarget::Window { id: 999 }, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(0, 0, 2560, 1440));

        let region = resolve_region(&CaptureTarget::Window { id: 7 }, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(0, 0, 2560, 1440));
    }

    #[test]
    fn small_region_is_rejected() {
        let target = CaptureTarget::Region {
            left: 0,
            top: 0,
            width: 99,
            height: 300,
        };
        assert!(matches!(
            resolve_region(&target, &displays()),
            Err(CaptureError::InvalidRegion(_))
        ));
    }

    #[test]
    fn region_passes_through() {
        let target = CaptureTarget::Region {
            left: 10,
            top: 20,
            width: 400,
            height: 300,
        };
        let region = resolve_region(&target, &displays()).unwrap();
        assert_eq!(region, CaptureRegion::new(10, 20, 400, 300));
        assert!(region.width > 0 && region.height > 0);
    }
}
