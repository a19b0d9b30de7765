use std::collections::BTreeSet;

use serde::Serialize;

use super::target::{DisplayId, DisplayInfo, WindowId, WindowInfo};

/// Immutable description of what a capture stream includes.
///
/// Equality is content identity: two specs are equal iff they would capture
/// the same pixels. Cosmetic window fields (title, frame) do not take part.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterSpec {
    /// No target selected. A session must never start with this.
    Empty,
    Display {
        display: DisplayInfo,
        excluded_bundle_ids: BTreeSet<String>,
        excluded_window_ids: BTreeSet<WindowId>,
    },
    Window {
        window: WindowInfo,
    },
}

#[derive(PartialEq)]
enum ContentKey<'a> {
    Empty,
    Display(DisplayId, &'a BTreeSet<String>, &'a BTreeSet<WindowId>),
    Window(WindowId),
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn content_key(&self) -> ContentKey<'_> {
        match self {
            Self::Empty => ContentKey::Empty,
            Self::Display {
                display,
                excluded_bundle_ids,
                excluded_window_ids,
            } => ContentKey::Display(display.id, excluded_bundle_ids, excluded_window_ids),
            Self::Window { window } => ContentKey::Window(window.id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Empty => "empty filter".into(),
            Self::Display {
                display,
                excluded_bundle_ids,
                excluded_window_ids,
            } => format!(
                "display {} excluding {} apps, {} windows",
                display.id,
                excluded_bundle_ids.len(),
                excluded_window_ids.len()
            ),
            Self::Window { window } => format!("window {}", window.id),
        }
    }
}

impl PartialEq for FilterSpec {
    fn eq(&self, other: &Self) -> bool {
        self.content_key() == other.content_key()
    }
}

impl Eq for FilterSpec {}
