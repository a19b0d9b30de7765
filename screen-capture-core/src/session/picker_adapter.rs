use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::picker_source::{
    PickerEvent, PickerEventSender, PickerMessage, PickerSource, SubscriptionId,
};

use super::controller::CaptureController;

struct Activation {
    subscription: SubscriptionId,
    tx: Sender<PickerMessage>,
    worker: JoinHandle<()>,
}

/// Bridges a system picker into the controller.
///
/// Picker events arrive on arbitrary threads. They are queued on a channel
/// and handled one at a time by a dedicated `picker-events` worker, which
/// drives the controller exactly like a UI call would.
pub struct PickerAdapter {
    source: Arc<dyn PickerSource>,
    controller: Arc<CaptureController>,
    active: Mutex<Option<Activation>>,
}

impl PickerAdapter {
    pub fn new(source: Arc<dyn PickerSource>, controller: Arc<CaptureController>) -> Self {
        Self {
            source,
            controller,
            active: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Subscribe to the picker. Calling it again while active does nothing.
    pub fn activate(&self) -> Result<(), CaptureError> {
        let mut active = self.active.lock();
        if active.is_some() {
            log::debug!("Picker already active");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let controller = Arc::clone(&self.controller);
        let worker = thread::Builder::new()
            .name("picker-events".into())
            .spawn(move || run_worker(rx, controller))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn picker worker: {}", e)))?;

        match self.source.subscribe(PickerEventSender::new(tx.clone())) {
            Ok(subscription) => {
                log::info!("Picker activated (subscription {})", subscription);
                *active = Some(Activation {
                    subscription,
                    tx,
                    worker,
                });
                Ok(())
            }
            Err(e) => {
                let _ = tx.send(PickerMessage::Shutdown);
                let _ = worker.join();
                Err(e)
            }
        }
    }

    /// Unsubscribe and stop the worker once queued events are handled.
    /// Calling it while inactive does nothing.
    pub fn deactivate(&self) {
        let Some(activation) = self.active.lock().take() else {
            return;
        };
        self.source.unsubscribe(activation.subscription);
        let _ = activation.tx.send(PickerMessage::Shutdown);

        // Deactivating from a delegate callback runs on the worker itself.
        if activation.worker.thread().id() == thread::current().id() {
            return;
        }
        if activation.worker.join().is_err() {
            log::error!("Picker worker panicked");
        }
        log::info!("Picker deactivated");
    }

    /// Show the picker UI.
    pub fn present(&self) -> Result<(), CaptureError> {
        if !self.is_active() {
            return Err(CaptureError::PickerInactive);
        }
        self.source.present()
    }
}

impl Drop for PickerAdapter {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn run_worker(rx: Receiver<PickerMessage>, controller: Arc<CaptureController>) {
    while let Ok(message) = rx.recv() {
        match message {
            PickerMessage::Event(event) => handle_event(&controller, event),
            PickerMessage::Shutdown => break,
        }
    }
    log::debug!("Picker worker exiting");
}

fn handle_event(controller: &CaptureController, event: PickerEvent) {
    match event {
        PickerEvent::TargetUpdated(selection) => {
            log::info!("Picker selected {}", selection.target.describe());
            match controller.apply_picker_selection(selection) {
                Ok(outcome) => log::debug!("Picker selection handled: {:?}", outcome),
                Err(e) => {
                    log::error!("Picker-driven capture request failed: {}", e);
                    controller.session().report_error(&e);
                }
            }
        }
        // The previous target stays selected.
        PickerEvent::Canceled => log::info!("Picker canceled"),
        PickerEvent::Failed(reason) => log::warn!("Picker failed: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::FilterSpec;
    use crate::models::settings::CaptureSettings;
    use crate::models::state::SessionState;
    use crate::session::capture_session::CaptureSession;
    use crate::test_support::{
        display_target, test_options, window_target, FakePicker, FakeService, Recorder,
    };
    use crate::traits::picker_source::PickerSelection;

    struct Fixture {
        service: FakeService,
        picker: Arc<FakePicker>,
        controller: Arc<CaptureController>,
        recorder: Arc<Recorder>,
        adapter: PickerAdapter,
    }

    fn fixture() -> Fixture {
        let service = FakeService::default();
        let session = Arc::new(CaptureSession::with_options(Arc::new(service.clone()), test_options()));
        let recorder = Arc::new(Recorder::default());
        session.set_delegate(recorder.clone());
        let controller = Arc::new(CaptureController::new(session, &CaptureSettings::default()));
        let picker = Arc::new(FakePicker::default());
        let adapter = PickerAdapter::new(picker.clone(), Arc::clone(&controller));
        Fixture {
            service,
            picker,
            controller,
            recorder,
            adapter,
        }
    }

    #[test]
    fn activation_is_idempotent() {
        let f = fixture();
        f.adapter.activate().unwrap();
        f.adapter.activate().unwrap();
        assert_eq!(*f.picker.subscribe_calls.lock(), 1);
        assert_eq!(f.picker.subscriber_count(), 1);

        f.adapter.deactivate();
        f.adapter.deactivate();
        assert_eq!(f.picker.subscriber_count(), 0);
        assert!(!f.adapter.is_active());

        f.adapter.activate().unwrap();
        assert_eq!(f.picker.subscriber_count(), 1);
    }

    #[test]
    fn present_requires_activation() {
        let f = fixture();
        assert_eq!(f.adapter.present(), Err(CaptureError::PickerInactive));

        f.adapter.activate().unwrap();
        f.adapter.present().unwrap();
        assert_eq!(*f.picker.presented.lock(), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let f = fixture();
        f.adapter.activate().unwrap();
        let picker = Arc::clone(&f.picker);
        drop(f);
        assert_eq!(picker.subscriber_count(), 0);
    }

    #[test]
    fn target_update_starts_idle_session() {
        let f = fixture();
        f.adapter.activate().unwrap();

        f.picker
            .publish(PickerEvent::TargetUpdated(PickerSelection::new(display_target())));
        f.adapter.deactivate();

        let session = f.controller.session();
        assert_eq!(session.state(), SessionState::Running);
        assert!(matches!(session.effective().unwrap().filter, FilterSpec::Display { .. }));
    }

    #[test]
    fn target_update_reconfigures_running_session() {
        let f = fixture();
        f.controller.select_target(display_target()).unwrap();
        f.controller.start().unwrap();
        f.adapter.activate().unwrap();

        f.picker
            .publish(PickerEvent::TargetUpdated(PickerSelection::new(window_target(4))));
        f.adapter.deactivate();

        assert_eq!(f.service.state.lock().stops, 0);
        assert_eq!(f.service.update_count(), 1);
        assert!(matches!(
            f.controller.session().effective().unwrap().filter,
            FilterSpec::Window { window } if window.id == 4
        ));
    }

    #[test]
    fn cancel_and_failure_keep_current_target() {
        let f = fixture();
        f.controller.select_target(display_target()).unwrap();
        f.controller.start().unwrap();
        let before = f.controller.session().effective();
        f.adapter.activate().unwrap();

        f.picker.publish(PickerEvent::Canceled);
        f.picker.publish(PickerEvent::Failed("picker crashed".into()));
        f.adapter.deactivate();

        assert_eq!(f.controller.session().effective(), before);
        assert_eq!(f.controller.target(), Some(display_target()));
        assert_eq!(f.controller.session().state(), SessionState::Running);
        assert!(f.recorder.errors.lock().is_empty());
    }

    #[test]
    fn failed_picker_start_is_reported() {
        let f = fixture();
        f.service.state.lock().reject_open = Some(CaptureError::PermissionDenied);
        f.adapter.activate().unwrap();

        f.picker
            .publish(PickerEvent::TargetUpdated(PickerSelection::new(display_target())));
        f.adapter.deactivate();

        assert_eq!(f.controller.session().state(), SessionState::Idle);
        assert_eq!(*f.recorder.errors.lock(), vec![CaptureError::PermissionDenied]);
    }
}
