//! Synthetic capture stream: generated frames and audio on dedicated threads.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use screen_capture_core::models::config::{MediaTime, StreamConfigSpec};
use screen_capture_core::models::error::CaptureError;
use screen_capture_core::models::filter::FilterSpec;
use screen_capture_core::models::media::FrameStatus;
use screen_capture_core::models::sample_buffer::{
    AudioFormatDescription, RawSampleBuffer, SampleFormat, StreamKind, VideoAttachments,
};
use screen_capture_core::models::target::Rect;
use screen_capture_core::traits::capture_service::{
    Acknowledgment, CaptureStream, SampleSink, StreamDelegate,
};

use crate::service::SyntheticOptions;
use crate::surface::SyntheticSurface;

/// Tone generated on the audio path.
const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.5;

pub(crate) struct StreamShared {
    running: AtomicBool,
    spec: RwLock<(FilterSpec, StreamConfigSpec)>,
    sinks: RwLock<HashMap<StreamKind, Arc<dyn SampleSink>>>,
    delegate: Arc<dyn StreamDelegate>,
    options: SyntheticOptions,
}

impl StreamShared {
    /// Simulate the platform tearing the stream down. Generation stops and
    /// the delegate is told; the handle stays alive until released.
    pub(crate) fn interrupt(&self, error: CaptureError) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::warn!("Synthetic stream interrupted: {}", error);
            self.delegate.did_stop_with_error(error);
        }
    }

    fn sink(&self, kind: StreamKind) -> Option<Arc<dyn SampleSink>> {
        self.sinks.read().get(&kind).cloned()
    }
}

/// Stream handed out by `SyntheticCaptureService`.
///
/// Video and audio are produced on `synthetic-video` / `synthetic-audio`
/// threads while started. Acknowledgments arrive after the configured
/// latency on a short-lived thread, like a platform completion handler.
pub struct SyntheticStream {
    shared: Arc<StreamShared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    live: Arc<AtomicBool>,
}

impl SyntheticStream {
    pub(crate) fn new(
        filter: FilterSpec,
        config: StreamConfigSpec,
        delegate: Arc<dyn StreamDelegate>,
        options: SyntheticOptions,
        live: Arc<AtomicBool>,
    ) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                running: AtomicBool::new(false),
                spec: RwLock::new((filter, config)),
                sinks: RwLock::new(HashMap::new()),
                delegate,
                options,
            }),
            workers: Mutex::new(Vec::new()),
            live,
        }
    }

    pub(crate) fn handle(&self) -> Weak<StreamShared> {
        Arc::downgrade(&self.shared)
    }

    fn acknowledge(&self, apply: impl FnOnce() -> Result<(), CaptureError> + Send + 'static) -> Acknowledgment {
        let latency = self.shared.options.ack_latency;
        if latency.is_zero() {
            return Acknowledgment::ready(apply());
        }
        let (sender, ack) = Acknowledgment::pending();
        let spawned = thread::Builder::new()
            .name("synthetic-ack".into())
            .spawn(move || {
                thread::sleep(latency);
                sender.send(apply());
            });
        match spawned {
            Ok(_) => ack,
            Err(e) => Acknowledgment::failed(CaptureError::Unknown(format!(
                "failed to spawn acknowledgment thread: {}",
                e
            ))),
        }
    }

    fn spawn_workers(&self) -> Result<(), CaptureError> {
        let mut workers = self.workers.lock();

        let shared = Arc::clone(&self.shared);
        let video = thread::Builder::new()
            .name("synthetic-video".into())
            .spawn(move || video_loop(shared))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn video thread: {}", e)))?;
        workers.push(video);

        let shared = Arc::clone(&self.shared);
        let audio = thread::Builder::new()
            .name("synthetic-audio".into())
            .spawn(move || audio_loop(shared))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn audio thread: {}", e)))?;
        workers.push(audio);

        Ok(())
    }

    fn join_workers(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("Synthetic generator thread panicked");
            }
        }
    }
}

impl CaptureStream for SyntheticStream {
    fn add_output(&mut self, kind: StreamKind, sink: Arc<dyn SampleSink>) -> Result<(), CaptureError> {
        self.shared.sinks.write().insert(kind, sink);
        Ok(())
    }

    fn remove_output(&mut self, kind: StreamKind) -> Result<(), CaptureError> {
        self.shared.sinks.write().remove(&kind);
        Ok(())
    }

    fn start(&mut self) -> Acknowledgment {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Acknowledgment::failed(CaptureError::StreamFailed("stream already started".into()));
        }
        if let Err(e) = self.spawn_workers() {
            self.join_workers();
            return Acknowledgment::failed(e);
        }
        log::debug!("Synthetic stream started");
        self.acknowledge(|| Ok(()))
    }

    fn stop(&mut self) -> Acknowledgment {
        self.join_workers();
        log::debug!("Synthetic stream stopped");
        self.acknowledge(|| Ok(()))
    }

    fn update(&mut self, filter: &FilterSpec, config: &StreamConfigSpec) -> Acknowledgment {
        if filter.is_empty() {
            return Acknowledgment::failed(CaptureError::ConfigurationRejected("empty filter".into()));
        }
        let shared = Arc::clone(&self.shared);
        let spec = (filter.clone(), config.clone());
        self.acknowledge(move || {
            *shared.spec.write() = spec;
            Ok(())
        })
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.join_workers();
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Geometry of the captured content for the current spec.
fn content_geometry(filter: &FilterSpec, config: &StreamConfigSpec) -> (Rect, f64) {
    let rect = match filter {
        FilterSpec::Display { display, .. } => {
            Rect::new(0.0, 0.0, display.resolution.width, display.resolution.height)
        }
        FilterSpec::Window { window } => Rect::new(0.0, 0.0, window.frame.width, window.frame.height),
        FilterSpec::Empty => Rect::default(),
    };
    let scale = if rect.width > 0.0 {
        config.width as f64 / rect.width
    } else {
        1.0
    };
    (rect, scale)
}

fn video_loop(shared: Arc<StreamShared>) {
    let started = Instant::now();
    let mut surface: Option<SyntheticSurface> = None;
    let mut frame_index: u64 = 0;

    while shared.running.load(Ordering::SeqCst) {
        let (interval, width, height, content_rect, scale_factor) = {
            let spec = shared.spec.read();
            let (rect, scale) = content_geometry(&spec.0, &spec.1);
            (spec.1.min_frame_interval.to_duration(), spec.1.width, spec.1.height, rect, scale)
        };
        thread::sleep(interval.max(Duration::from_millis(1)));

        let Some(sink) = shared.sink(StreamKind::Video) else {
            continue;
        };

        if !surface.as_ref().is_some_and(|s| s.matches_size(width, height)) {
            surface = Some(SyntheticSurface::new(frame_index, width, height));
        }
        let Some(current) = surface.as_mut() else {
            continue;
        };
        current.stamp(frame_index);

        let status = match shared.options.idle_frame_every {
            Some(n) if n > 0 && frame_index % n == n - 1 => FrameStatus::Idle,
            _ => FrameStatus::Complete,
        };
        let attachments = VideoAttachments {
            status: Some(status.raw()),
            content_rect: Some(content_rect),
            content_scale: Some(1.0),
            scale_factor: Some(scale_factor),
        };
        let pts = MediaTime::new(started.elapsed().as_micros() as i64, 1_000_000);
        sink.did_output_sample(&RawSampleBuffer::video(pts, attachments, Some(&*current)));
        frame_index += 1;
    }
    log::trace!("Video generator exiting after {} frames", frame_index);
}

fn audio_loop(shared: Arc<StreamShared>) {
    let started = Instant::now();
    let frames = shared.options.audio_frames_per_chunk.max(1);
    let mut phase = 0.0f32;

    while shared.running.load(Ordering::SeqCst) {
        let (enabled, sample_rate, channels) = {
            let spec = shared.spec.read();
            (spec.1.captures_audio, spec.1.sample_rate, spec.1.channel_count)
        };
        let chunk = Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64);
        thread::sleep(chunk);

        if !enabled {
            continue;
        }
        let Some(sink) = shared.sink(StreamKind::Audio) else {
            continue;
        };

        // Planar f32: one block of `frames` samples per channel.
        let step = TAU * TONE_HZ / sample_rate.max(1) as f32;
        let mut tone = Vec::with_capacity(frames);
        for _ in 0..frames {
            tone.push(TONE_AMPLITUDE * phase.sin());
            phase = (phase + step) % TAU;
        }
        let data: Vec<u8> = (0..channels)
            .flat_map(|_| tone.iter().flat_map(|s| s.to_le_bytes()))
            .collect();

        let format = AudioFormatDescription {
            sample_rate: sample_rate as f64,
            channel_count: channels,
            sample_format: SampleFormat::F32,
            interleaved: false,
        };
        let pts = MediaTime::new(started.elapsed().as_micros() as i64, 1_000_000);
        sink.did_output_sample(&RawSampleBuffer::audio(pts, Some(format), frames, &data));
    }
}
