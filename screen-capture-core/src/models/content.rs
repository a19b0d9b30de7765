use serde::{Deserialize, Serialize};

use super::target::{CaptureTarget, DisplayId, DisplayInfo, WindowId, WindowInfo};

/// A running application that owns capturable windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningApplication {
    pub bundle_id: String,
    pub name: String,
    pub process_id: u32,
}

/// Everything the capture service can currently capture.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShareableContent {
    pub displays: Vec<DisplayInfo>,
    pub windows: Vec<WindowInfo>,
    pub applications: Vec<RunningApplication>,
}

impl ShareableContent {
    pub fn display(&self, id: DisplayId) -> Option<&DisplayInfo> {
        self.displays.iter().find(|d| d.id == id)
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowInfo> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn display_target(&self, id: DisplayId) -> Option<CaptureTarget> {
        self.display(id).cloned().map(CaptureTarget::Display)
    }

    pub fn window_target(&self, id: WindowId) -> Option<CaptureTarget> {
        self.window(id).cloned().map(CaptureTarget::Window)
    }

    /// Whether `target` still exists in this snapshot.
    pub fn contains(&self, target: &CaptureTarget) -> bool {
        match target {
            CaptureTarget::Display(d) => self.display(d.id).is_some(),
            CaptureTarget::Window(w) => self.window(w.id).is_some(),
        }
    }

    /// Windows owned by the given application.
    pub fn windows_of<'a>(&'a self, bundle_id: &'a str) -> impl Iterator<Item = &'a WindowInfo> + 'a {
        self.windows
            .iter()
            .filter(move |w| w.bundle_id.as_deref() == Some(bundle_id))
    }
}
