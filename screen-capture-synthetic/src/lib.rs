//! # screen-capture-synthetic
//!
//! Synthetic backend for screen-capture-kit.
//!
//! Provides:
//! - `SyntheticCaptureService` — `CaptureService` generating frames and a test tone
//! - `SyntheticStream` — the stream it hands out, driven by generator threads
//! - `SyntheticSurface` — CPU-backed `PixelSurface`
//! - `SyntheticPicker` — scripted `PickerSource`
//!
//! Used by the CLI and by end-to-end tests; platform backends follow the same
//! shape.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use screen_capture_core::CaptureSession;
//! use screen_capture_synthetic::SyntheticCaptureService;
//!
//! let service = Arc::new(SyntheticCaptureService::demo());
//! let session = CaptureSession::new(service);
//! ```

pub mod picker;
pub mod service;
pub mod stream;
pub mod surface;

pub use picker::SyntheticPicker;
pub use service::{demo_content, SyntheticCaptureService, SyntheticOptions};
pub use stream::SyntheticStream;
pub use surface::SyntheticSurface;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use parking_lot::Mutex;
    use screen_capture_core::{
        AudioChunk, AudioLevels, CaptureController, CaptureDelegate, CaptureError, CaptureSession,
        CaptureSettings, CaptureTarget, FilterSpec, PickerAdapter, PickerEvent, PickerSelection,
        ReconfigureOutcome, Rect, SelectionOutcome, SessionOptions, SessionState, VideoFrame,
    };

    use super::*;

    #[derive(Default)]
    struct Counter {
        frames: Mutex<Vec<(Rect, u32)>>,
        audio_frames: Mutex<usize>,
        levels: Mutex<Option<AudioLevels>>,
        errors: Mutex<Vec<CaptureError>>,
    }

    impl CaptureDelegate for Counter {
        fn on_video_frame(&self, frame: &VideoFrame<'_>) {
            self.frames.lock().push((frame.content_rect, frame.surface.width()));
        }
        fn on_audio_chunk(&self, chunk: &AudioChunk) {
            *self.audio_frames.lock() += chunk.frame_count();
        }
        fn on_levels_updated(&self, levels: &AudioLevels) {
            *self.levels.lock() = Some(levels.clone());
        }
        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }
    }

    fn wait_for(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn setup(options: SyntheticOptions, settings: CaptureSettings) -> (Arc<SyntheticCaptureService>, CaptureController, Arc<Counter>) {
        let service = Arc::new(SyntheticCaptureService::with_options(demo_content(), options));
        let session = Arc::new(CaptureSession::with_options(
            service.clone(),
            SessionOptions {
                ack_timeout: Duration::from_secs(2),
            },
        ));
        let counter = Arc::new(Counter::default());
        session.set_delegate(counter.clone());
        (service, CaptureController::new(session, &settings), counter)
    }

    fn small_display() -> CaptureTarget {
        demo_content().display_target(1).unwrap()
    }

    #[test]
    fn display_capture_with_audio() {
        let settings = CaptureSettings {
            captures_audio: true,
            scale_factor: Some(0.25),
            ..Default::default()
        };
        let (service, controller, counter) = setup(SyntheticOptions::default(), settings);
        controller.select_target(small_display()).unwrap();
        controller.start().unwrap();

        wait_for("video frames", || counter.frames.lock().len() >= 3);
        wait_for("audio", || *counter.audio_frames.lock() >= 960);

        let (rect, width) = counter.frames.lock()[0];
        assert_eq!(rect, Rect::new(0.0, 0.0, 1920.0, 1080.0));
        assert_eq!(width, 480);

        let levels = counter.levels.lock().clone().unwrap();
        assert_eq!(levels.channels.len(), 2);
        assert!(levels.peak > 0.4 && levels.peak <= 0.5);

        controller.stop().unwrap();
        assert!(!service.has_live_stream());
        assert_eq!(controller.session().current_levels(), AudioLevels::default());
        assert!(counter.errors.lock().is_empty());
    }

    #[test]
    fn reconfigure_to_window_without_restart() {
        let options = SyntheticOptions {
            ack_latency: Duration::from_millis(20),
            ..Default::default()
        };
        let settings = CaptureSettings {
            scale_factor: Some(0.25),
            ..Default::default()
        };
        let (_service, controller, counter) = setup(options, settings);
        controller.select_target(small_display()).unwrap();
        controller.start().unwrap();
        wait_for("display frames", || !counter.frames.lock().is_empty());

        let window = demo_content().window_target(103).unwrap();
        let outcome = controller.select_target(window).unwrap();
        assert_eq!(outcome, SelectionOutcome::Reconfigured(ReconfigureOutcome::Applied));

        let window_rect = Rect::new(0.0, 0.0, 320.0, 240.0);
        wait_for("window frames", || counter.frames.lock().iter().any(|(r, _)| *r == window_rect));
        assert_eq!(controller.session().state(), SessionState::Running);
        controller.stop().unwrap();
    }

    #[test]
    fn idle_frames_are_not_delivered() {
        let options = SyntheticOptions {
            idle_frame_every: Some(2),
            ..Default::default()
        };
        let settings = CaptureSettings {
            scale_factor: Some(0.1),
            ..Default::default()
        };
        let (_service, controller, _counter) = setup(options, settings);
        controller.select_target(small_display()).unwrap();
        controller.start().unwrap();

        let session = Arc::clone(controller.session());
        wait_for("skipped frames", || session.diagnostics().frames_skipped >= 2);
        controller.stop().unwrap();

        let diagnostics = session.diagnostics();
        assert!(diagnostics.video_frames_delivered >= 1);
        assert!(diagnostics.frames_skipped >= 2);
    }

    #[test]
    fn interrupted_stream_reports_and_recovers() {
        let settings = CaptureSettings {
            scale_factor: Some(0.1),
            ..Default::default()
        };
        let (service, controller, counter) = setup(SyntheticOptions::default(), settings);
        controller.select_target(small_display()).unwrap();
        controller.start().unwrap();

        assert!(service.interrupt_stream(CaptureError::TargetUnavailable));
        assert_eq!(controller.session().state(), SessionState::Idle);
        assert_eq!(*counter.errors.lock(), vec![CaptureError::TargetUnavailable]);

        controller.start().unwrap();
        assert_eq!(controller.session().state(), SessionState::Running);
        controller.stop().unwrap();
        assert!(!service.has_live_stream());
    }

    #[test]
    fn picker_drives_session() {
        let settings = CaptureSettings {
            scale_factor: Some(0.1),
            ..Default::default()
        };
        let (_service, controller, _counter) = setup(SyntheticOptions::default(), settings);
        let controller = Arc::new(controller);
        let picker = Arc::new(SyntheticPicker::new());
        let adapter = PickerAdapter::new(picker.clone(), Arc::clone(&controller));
        adapter.activate().unwrap();

        picker.script(PickerEvent::TargetUpdated(PickerSelection::new(small_display())));
        adapter.present().unwrap();
        wait_for("picker start", || controller.session().state().is_running());

        picker.cancel();
        let window = demo_content().window_target(101).unwrap();
        picker.pick(PickerSelection::new(window));
        adapter.deactivate();

        assert!(matches!(
            controller.session().effective().unwrap().filter,
            FilterSpec::Window { window } if window.id == 101
        ));
        assert_eq!(picker.subscriber_count(), 0);
        controller.stop().unwrap();
    }
}
