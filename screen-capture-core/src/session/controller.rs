use std::sync::Arc;

use parking_lot::Mutex;

use crate::builders::config_builder::{build_config, native_scale_factor};
use crate::builders::filter_builder::build_filter;
use crate::models::config::{AudioFlags, SpecPair};
use crate::models::error::CaptureError;
use crate::models::settings::CaptureSettings;
use crate::models::state::SessionState;
use crate::models::target::{CaptureTarget, ExclusionSet};
use crate::traits::picker_source::PickerSelection;

use super::capture_session::{CaptureSession, ReconfigureOutcome};

/// What a selection edit did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Stored for the next start; nothing is running.
    Recorded,
    /// The session was idle and has been started with the new selection.
    Started,
    /// The running stream was reconfigured.
    Reconfigured(ReconfigureOutcome),
}

#[derive(Debug, Clone)]
struct Selection {
    target: Option<CaptureTarget>,
    exclusions: ExclusionSet,
    audio: AudioFlags,
    queue_depth: usize,
    scale_factor: Option<f64>,
}

impl Selection {
    fn compose(&self) -> Option<SpecPair> {
        let target = self.target.as_ref()?;
        let scale = self.scale_factor.unwrap_or_else(|| native_scale_factor(target));
        Some(SpecPair::new(
            build_filter(Some(target), &self.exclusions),
            build_config(target, self.audio, scale, self.queue_depth),
        ))
    }
}

/// Inbound surface for UI and config layers.
///
/// Holds the user's current selection and turns every edit into a spec pair
/// for the session. Edits that affect a running stream are issued while the
/// selection lock is held, so the service sees them in edit order; the
/// acknowledgment is awaited after the lock is released.
pub struct CaptureController {
    session: Arc<CaptureSession>,
    selection: Mutex<Selection>,
}

impl CaptureController {
    pub fn new(session: Arc<CaptureSession>, settings: &CaptureSettings) -> Self {
        Self {
            session,
            selection: Mutex::new(Selection {
                target: None,
                exclusions: settings.exclusions(),
                audio: settings.audio_flags(),
                queue_depth: settings.queue_depth,
                scale_factor: settings.scale_factor,
            }),
        }
    }

    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    pub fn target(&self) -> Option<CaptureTarget> {
        self.selection.lock().target.clone()
    }

    /// The pair the current selection would produce, if a target is selected.
    pub fn pending_pair(&self) -> Option<SpecPair> {
        self.selection.lock().compose()
    }

    pub fn select_target(&self, target: CaptureTarget) -> Result<SelectionOutcome, CaptureError> {
        log::info!("Target selected: {}", target.describe());
        self.edit(|selection| selection.target = Some(target))
    }

    pub fn set_exclusions(&self, exclusions: ExclusionSet) -> Result<SelectionOutcome, CaptureError> {
        self.edit(|selection| selection.exclusions = exclusions)
    }

    pub fn set_audio_flags(&self, audio: AudioFlags) -> Result<SelectionOutcome, CaptureError> {
        self.edit(|selection| selection.audio = audio)
    }

    pub fn set_queue_depth(&self, queue_depth: usize) -> Result<SelectionOutcome, CaptureError> {
        self.edit(|selection| selection.queue_depth = queue_depth)
    }

    /// Start capturing the selected target.
    pub fn start(&self) -> Result<(), CaptureError> {
        let selection = self.selection.lock();
        let pair = selection.compose().ok_or_else(no_target)?;
        self.session.start(pair.filter, pair.config)
    }

    /// Stop capturing. Holds the selection lock, so a concurrent edit or
    /// picker selection sees the session either before or after the stop.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let _selection = self.selection.lock();
        self.session.stop()
    }

    /// Adopt a target asserted by the picker: reconfigure when running,
    /// start when idle.
    pub fn apply_picker_selection(
        &self,
        picked: PickerSelection,
    ) -> Result<SelectionOutcome, CaptureError> {
        let mut selection = self.selection.lock();
        selection.target = Some(picked.target);
        selection.exclusions = picked.exclusions;
        let pair = selection.compose().ok_or_else(no_target)?;

        match self.session.state() {
            SessionState::Idle => {
                self.session.start(pair.filter, pair.config)?;
                Ok(SelectionOutcome::Started)
            }
            SessionState::Running => {
                let pending = self.session.begin_reconfigure(pair.filter, pair.config)?;
                drop(selection);
                Ok(SelectionOutcome::Reconfigured(pending.wait()?))
            }
            SessionState::Starting | SessionState::Stopping => Ok(SelectionOutcome::Recorded),
        }
    }

    fn edit(&self, apply: impl FnOnce(&mut Selection)) -> Result<SelectionOutcome, CaptureError> {
        let pending = {
            let mut selection = self.selection.lock();
            apply(&mut selection);
            if !self.session.state().is_running() {
                return Ok(SelectionOutcome::Recorded);
            }
            let Some(pair) = selection.compose() else {
                return Ok(SelectionOutcome::Recorded);
            };
            self.session.begin_reconfigure(pair.filter, pair.config)?
        };
        Ok(SelectionOutcome::Reconfigured(pending.wait()?))
    }
}

fn no_target() -> CaptureError {
    CaptureError::ConfigurationRejected("no capture target selected".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crate::models::filter::FilterSpec;
    use crate::models::sample_buffer::StreamKind;
    use crate::test_support::{display_target, test_options, window_target, FakeService};

    fn setup(settings: &CaptureSettings) -> (FakeService, CaptureController) {
        let service = FakeService::default();
        let session = Arc::new(CaptureSession::with_options(Arc::new(service.clone()), test_options()));
        (service, CaptureController::new(session, settings))
    }

    fn exclusions() -> ExclusionSet {
        let mut set = ExclusionSet::with_bundle_ids(["com.example.chat"]);
        set.exclude_window(42);
        set
    }

    #[test]
    fn window_filter_ignores_exclusions() {
        let (_service, controller) = setup(&CaptureSettings::default());
        controller.select_target(window_target(7)).unwrap();
        let plain = controller.pending_pair().unwrap().filter;

        controller.set_exclusions(exclusions()).unwrap();
        let excluded = controller.pending_pair().unwrap().filter;

        assert_eq!(plain, excluded);
        assert_eq!(excluded, build_filter(Some(&window_target(7)), &ExclusionSet::new()));
    }

    #[test]
    fn edits_while_idle_are_only_recorded() {
        let (service, controller) = setup(&CaptureSettings::default());

        assert_eq!(controller.select_target(display_target()), Ok(SelectionOutcome::Recorded));
        assert_eq!(controller.set_queue_depth(5), Ok(SelectionOutcome::Recorded));
        assert_eq!(service.update_count(), 0);
        assert_eq!(service.state.lock().live_streams, 0);
        assert_eq!(controller.pending_pair().unwrap().config.queue_depth, 5);
    }

    #[test]
    fn start_without_target_is_rejected() {
        let (_service, controller) = setup(&CaptureSettings::default());
        assert!(matches!(controller.start(), Err(CaptureError::ConfigurationRejected(_))));
        assert_eq!(controller.session().state(), SessionState::Idle);
    }

    #[test]
    fn start_uses_settings() {
        let settings = CaptureSettings {
            queue_depth: 6,
            captures_audio: true,
            ..Default::default()
        };
        let (service, controller) = setup(&settings);
        controller.select_target(display_target()).unwrap();
        controller.start().unwrap();

        let config = service.state.lock().opened_with.clone().unwrap();
        assert_eq!(config.queue_depth, 6);
        assert_eq!((config.width, config.height), (3840, 2160));
        assert!(service.has_sink(StreamKind::Audio));
    }

    #[test]
    fn scale_factor_override_wins_over_display_scale() {
        let settings = CaptureSettings {
            scale_factor: Some(1.0),
            ..Default::default()
        };
        let (_service, controller) = setup(&settings);
        controller.select_target(display_target()).unwrap();

        let config = controller.pending_pair().unwrap().config;
        assert_eq!((config.width, config.height), (1920, 1080));
    }

    #[test]
    fn edits_while_running_reconfigure() {
        let (service, controller) = setup(&CaptureSettings::default());
        controller.select_target(display_target()).unwrap();
        controller.start().unwrap();

        let outcome = controller.set_exclusions(exclusions()).unwrap();
        assert_eq!(outcome, SelectionOutcome::Reconfigured(ReconfigureOutcome::Applied));
        match controller.session().effective().unwrap().filter {
            FilterSpec::Display {
                excluded_bundle_ids,
                excluded_window_ids,
                ..
            } => {
                assert!(excluded_bundle_ids.contains("com.example.chat"));
                assert!(excluded_window_ids.contains(&42));
            }
            other => panic!("expected display filter, got {:?}", other),
        }

        controller.set_audio_flags(AudioFlags::new(true, true)).unwrap();
        assert!(service.has_sink(StreamKind::Audio));
        assert_eq!(service.update_count(), 2);
    }

    #[test]
    fn picker_selection_starts_then_reconfigures() {
        let (service, controller) = setup(&CaptureSettings::default());

        let outcome = controller
            .apply_picker_selection(PickerSelection::new(display_target()))
            .unwrap();
        assert_eq!(outcome, SelectionOutcome::Started);
        assert!(controller.session().state().is_running());

        let outcome = controller
            .apply_picker_selection(PickerSelection::new(window_target(9)))
            .unwrap();
        assert_eq!(outcome, SelectionOutcome::Reconfigured(ReconfigureOutcome::Applied));
        assert!(matches!(
            controller.session().effective().unwrap().filter,
            FilterSpec::Window { window } if window.id == 9
        ));
        assert_eq!(service.state.lock().stops, 0);
        assert_eq!(controller.target(), Some(window_target(9)));
    }

    #[test]
    fn stop_waits_for_selection_in_progress() {
        let (service, controller) = setup(&CaptureSettings::default());
        let controller = Arc::new(controller);
        controller.select_target(display_target()).unwrap();
        controller.start().unwrap();

        // A picker selection that has read Running but not yet reconfigured.
        let selection = controller.selection.lock();
        let stopper = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || controller.stop())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!stopper.is_finished());
        assert_eq!(controller.session().state(), SessionState::Running);

        let pair = SpecPair::new(
            build_filter(Some(&window_target(4)), &ExclusionSet::new()),
            build_config(&window_target(4), AudioFlags::default(), 2.0, 3),
        );
        let pending = controller.session().begin_reconfigure(pair.filter, pair.config).unwrap();
        drop(selection);
        assert_eq!(pending.wait(), Ok(ReconfigureOutcome::Applied));

        assert_eq!(stopper.join().unwrap(), Ok(()));
        assert_eq!(controller.session().state(), SessionState::Idle);
        assert_eq!(service.update_count(), 1);

        let outcome = controller
            .apply_picker_selection(PickerSelection::new(window_target(4)))
            .unwrap();
        assert_eq!(outcome, SelectionOutcome::Started);
    }
}
