//! In-memory fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::StreamConfigSpec;
use crate::models::content::ShareableContent;
use crate::models::diagnostics::AudioLevels;
use crate::models::error::CaptureError;
use crate::models::filter::FilterSpec;
use crate::models::media::{AudioChunk, VideoFrame};
use crate::models::sample_buffer::{PixelSurface, RawSampleBuffer, StreamKind};
use crate::models::settings::SessionOptions;
use crate::models::state::SessionState;
use crate::models::target::{CaptureTarget, DisplayInfo, Rect, Size, WindowInfo};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_service::{
    AckSender, Acknowledgment, CaptureService, CaptureStream, SampleSink, StreamDelegate,
};
use crate::traits::picker_source::{PickerEvent, PickerEventSender, PickerSource, SubscriptionId};

pub(crate) fn test_options() -> SessionOptions {
    SessionOptions {
        ack_timeout: Duration::from_secs(5),
    }
}

pub(crate) fn display_target() -> CaptureTarget {
    CaptureTarget::Display(DisplayInfo {
        id: 1,
        resolution: Size::new(1920.0, 1080.0),
        scale_factor: 2.0,
    })
}

pub(crate) fn window_target(id: u32) -> CaptureTarget {
    CaptureTarget::Window(WindowInfo {
        id,
        frame: Rect::new(0.0, 0.0, 400.0, 300.0),
        title: None,
        bundle_id: None,
    })
}

// --- Capture service ---

#[derive(Default)]
pub(crate) struct FakeState {
    pub live_streams: usize,
    pub reject_open: Option<CaptureError>,
    pub reject_start: Option<CaptureError>,
    pub manual_start: bool,
    pub reject_stop: Option<CaptureError>,
    pub pending_start: Option<AckSender>,
    pub manual_updates: bool,
    pub pending_updates: Vec<Option<AckSender>>,
    pub updates: Vec<FilterSpec>,
    pub opened_with: Option<StreamConfigSpec>,
    pub sinks: HashMap<StreamKind, Arc<dyn SampleSink>>,
    pub delegate: Option<Arc<dyn StreamDelegate>>,
    pub stops: usize,
}

/// Service whose acknowledgments are either immediate or resolved by the test.
#[derive(Clone, Default)]
pub(crate) struct FakeService {
    pub state: Arc<Mutex<FakeState>>,
}

struct FakeStream {
    state: Arc<Mutex<FakeState>>,
}

impl FakeService {
    pub fn deliver(&self, kind: StreamKind, buffer: &RawSampleBuffer<'_>) {
        let sink = self.state.lock().sinks.get(&kind).cloned();
        if let Some(sink) = sink {
            sink.did_output_sample(buffer);
        }
    }

    pub fn fail_stream(&self, error: CaptureError) {
        let delegate = self.state.lock().delegate.clone();
        if let Some(delegate) = delegate {
            delegate.did_stop_with_error(error);
        }
    }

    pub fn resolve_update(&self, index: usize, result: Result<(), CaptureError>) {
        let sender = self.state.lock().pending_updates[index].take();
        sender.expect("update already resolved").send(result);
    }

    pub fn resolve_start(&self, result: Result<(), CaptureError>) {
        let sender = self.state.lock().pending_start.take();
        sender.expect("no start awaiting acknowledgment").send(result);
    }

    pub fn start_pending(&self) -> bool {
        self.state.lock().pending_start.is_some()
    }

    pub fn has_sink(&self, kind: StreamKind) -> bool {
        self.state.lock().sinks.contains_key(&kind)
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().updates.len()
    }
}

impl CaptureService for FakeService {
    fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        Ok(ShareableContent::default())
    }

    fn open_stream(
        &self,
        _filter: &FilterSpec,
        config: &StreamConfigSpec,
        delegate: Arc<dyn StreamDelegate>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let mut s = self.state.lock();
        if let Some(e) = s.reject_open.clone() {
            return Err(e);
        }
        if s.live_streams > 0 {
            return Err(CaptureError::StreamAlreadyActive);
        }
        s.live_streams += 1;
        s.delegate = Some(delegate);
        s.opened_with = Some(config.clone());
        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
        }))
    }
}

impl CaptureStream for FakeStream {
    fn add_output(&mut self, kind: StreamKind, sink: Arc<dyn SampleSink>) -> Result<(), CaptureError> {
        self.state.lock().sinks.insert(kind, sink);
        Ok(())
    }

    fn remove_output(&mut self, kind: StreamKind) -> Result<(), CaptureError> {
        self.state.lock().sinks.remove(&kind);
        Ok(())
    }

    fn start(&mut self) -> Acknowledgment {
        let mut s = self.state.lock();
        if let Some(e) = s.reject_start.clone() {
            return Acknowledgment::failed(e);
        }
        if s.manual_start {
            let (sender, ack) = Acknowledgment::pending();
            s.pending_start = Some(sender);
            return ack;
        }
        Acknowledgment::ok()
    }

    fn stop(&mut self) -> Acknowledgment {
        let mut s = self.state.lock();
        s.stops += 1;
        match s.reject_stop.clone() {
            Some(e) => Acknowledgment::failed(e),
            None => Acknowledgment::ok(),
        }
    }

    fn update(&mut self, filter: &FilterSpec, _config: &StreamConfigSpec) -> Acknowledgment {
        let mut s = self.state.lock();
        s.updates.push(filter.clone());
        if s.manual_updates {
            let (sender, ack) = Acknowledgment::pending();
            s.pending_updates.push(Some(sender));
            ack
        } else {
            Acknowledgment::ok()
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        let mut s = self.state.lock();
        s.live_streams -= 1;
        s.delegate = None;
    }
}

// --- Delegate ---

#[derive(Default)]
pub(crate) struct Recorder {
    pub frames: Mutex<Vec<Rect>>,
    pub chunks: Mutex<Vec<usize>>,
    pub states: Mutex<Vec<SessionState>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub level_updates: Mutex<usize>,
}

impl CaptureDelegate for Recorder {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }
    fn on_video_frame(&self, frame: &VideoFrame<'_>) {
        self.frames.lock().push(frame.content_rect);
    }
    fn on_audio_chunk(&self, chunk: &AudioChunk) {
        self.chunks.lock().push(chunk.frame_count());
    }
    fn on_levels_updated(&self, _levels: &AudioLevels) {
        *self.level_updates.lock() += 1;
    }
    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }
}

pub(crate) struct BlankSurface;

impl PixelSurface for BlankSurface {
    fn id(&self) -> u64 {
        1
    }
    fn width(&self) -> u32 {
        1
    }
    fn height(&self) -> u32 {
        1
    }
    fn bytes_per_row(&self) -> usize {
        4
    }
    fn pixels(&self) -> &[u8] {
        &[0, 0, 0, 255]
    }
}

// --- Picker ---

#[derive(Default)]
pub(crate) struct FakePicker {
    subscribers: Mutex<HashMap<SubscriptionId, PickerEventSender>>,
    next_id: Mutex<SubscriptionId>,
    pub subscribe_calls: Mutex<usize>,
    pub presented: Mutex<usize>,
}

impl FakePicker {
    pub fn publish(&self, event: PickerEvent) {
        let subscribers: Vec<PickerEventSender> = self.subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            subscriber.send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl PickerSource for FakePicker {
    fn subscribe(&self, events: PickerEventSender) -> Result<SubscriptionId, CaptureError> {
        *self.subscribe_calls.lock() += 1;
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.subscribers.lock().insert(id, events);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }

    fn present(&self) -> Result<(), CaptureError> {
        *self.presented.lock() += 1;
        Ok(())
    }
}
