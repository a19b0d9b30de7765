use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub type DisplayId = u32;
pub type WindowId = u32;

/// Width and height in points (or pixels, depending on context).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle, origin at top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A display that can be captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    /// Native resolution in points.
    pub resolution: Size,
    /// Backing scale factor (2.0 on Retina-class panels).
    pub scale_factor: f64,
}

/// An on-screen window that can be captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub frame: Rect,
    pub title: Option<String>,
    pub bundle_id: Option<String>,
}

/// What a session captures. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaptureTarget {
    Display(DisplayInfo),
    Window(WindowInfo),
}

impl CaptureTarget {
    pub fn is_window(&self) -> bool {
        matches!(self, Self::Window(_))
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Display(d) => format!("display {}", d.id),
            Self::Window(w) => match &w.title {
                Some(title) => format!("window {} ({})", w.id, title),
                None => format!("window {}", w.id),
            },
        }
    }
}

/// Applications and windows removed from a display capture.
///
/// Only meaningful for display targets; window capture ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSet {
    pub bundle_ids: BTreeSet<String>,
    pub window_ids: BTreeSet<WindowId>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bundle_ids: ids.into_iter().map(Into::into).collect(),
            window_ids: BTreeSet::new(),
        }
    }

    pub fn exclude_bundle_id(&mut self, bundle_id: impl Into<String>) {
        self.bundle_ids.insert(bundle_id.into());
    }

    pub fn exclude_window(&mut self, window_id: WindowId) {
        self.window_ids.insert(window_id);
    }

    pub fn is_empty(&self) -> bool {
        self.bundle_ids.is_empty() && self.window_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_window_with_title() {
        let target = CaptureTarget::Window(WindowInfo {
            id: 7,
            frame: Rect::new(0.0, 0.0, 10.0, 10.0),
            title: Some("Notes".into()),
            bundle_id: None,
        });
        assert_eq!(target.describe(), "window 7 (Notes)");
        assert!(target.is_window());
    }

    #[test]
    fn exclusion_set_tracks_emptiness() {
        let mut set = ExclusionSet::new();
        assert!(set.is_empty());
        set.exclude_window(3);
        assert!(!set.is_empty());

        let apps = ExclusionSet::with_bundle_ids(["com.example.chat"]);
        assert!(apps.bundle_ids.contains("com.example.chat"));
    }

    #[test]
    fn target_serializes_with_kind_tag() {
        let target = CaptureTarget::Display(DisplayInfo {
            id: 1,
            resolution: Size::new(1920.0, 1080.0),
            scale_factor: 2.0,
        });
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["kind"], "display");
        assert_eq!(json["id"], 1);
    }
}
