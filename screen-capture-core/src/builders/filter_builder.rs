use crate::models::filter::FilterSpec;
use crate::models::target::{CaptureTarget, ExclusionSet};

/// Derive the content filter for a selection.
///
/// No target yields `FilterSpec::Empty`, which a session refuses to start
/// with. Exclusions apply to display captures only: a window target captures
/// exactly that window, so any exclusions passed alongside it are ignored.
pub fn build_filter(target: Option<&CaptureTarget>, exclusions: &ExclusionSet) -> FilterSpec {
    match target {
        None => FilterSpec::Empty,
        Some(CaptureTarget::Display(display)) => FilterSpec::Display {
            display: display.clone(),
            excluded_bundle_ids: exclusions.bundle_ids.clone(),
            excluded_window_ids: exclusions.window_ids.clone(),
        },
        Some(CaptureTarget::Window(window)) => {
            if !exclusions.is_empty() {
                log::debug!(
                    "Ignoring {} exclusions for window {} capture",
                    exclusions.bundle_ids.len() + exclusions.window_ids.len(),
                    window.id
                );
            }
            FilterSpec::Window {
                window: window.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::{DisplayInfo, Rect, Size, WindowInfo};

    fn display() -> CaptureTarget {
        CaptureTarget::Display(DisplayInfo {
            id: 1,
            resolution: Size::new(1920.0, 1080.0),
            scale_factor: 2.0,
        })
    }

    fn window() -> CaptureTarget {
        CaptureTarget::Window(WindowInfo {
            id: 42,
            frame: Rect::new(10.0, 10.0, 800.0, 600.0),
            title: Some("Terminal".into()),
            bundle_id: Some("com.example.terminal".into()),
        })
    }

    fn busy_exclusions() -> ExclusionSet {
        let mut set = ExclusionSet::with_bundle_ids(["com.example.chat", "com.example.mail"]);
        set.exclude_window(7);
        set
    }

    #[test]
    fn no_target_is_empty() {
        assert!(build_filter(None, &busy_exclusions()).is_empty());
    }

    #[test]
    fn window_target_ignores_exclusions() {
        let target = window();
        let with = build_filter(Some(&target), &busy_exclusions());
        let without = build_filter(Some(&target), &ExclusionSet::new());
        assert_eq!(with, without);
        assert!(matches!(with, FilterSpec::Window { ref window } if window.id == 42));
    }

    #[test]
    fn display_target_carries_exclusions() {
        let target = display();
        let spec = build_filter(Some(&target), &busy_exclusions());
        match &spec {
            FilterSpec::Display {
                display,
                excluded_bundle_ids,
                excluded_window_ids,
            } => {
                assert_eq!(display.id, 1);
                assert_eq!(excluded_bundle_ids.len(), 2);
                assert!(excluded_window_ids.contains(&7));
            }
            other => panic!("expected display filter, got {:?}", other),
        }
        assert_ne!(spec, build_filter(Some(&target), &ExclusionSet::new()));
    }
}
