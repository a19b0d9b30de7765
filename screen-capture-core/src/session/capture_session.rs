use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, RwLock};
use uuid::Uuid;

use crate::models::config::{SpecPair, StreamConfigSpec};
use crate::models::content::ShareableContent;
use crate::models::diagnostics::{AudioLevels, DeliveryDiagnostics};
use crate::models::error::CaptureError;
use crate::models::filter::FilterSpec;
use crate::models::media::Sample;
use crate::models::sample_buffer::{RawSampleBuffer, StreamKind};
use crate::models::settings::SessionOptions;
use crate::models::state::SessionState;
use crate::processing::demux::demux;
use crate::processing::level_monitor::AudioLevelMonitor;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_service::{
    Acknowledgment, CaptureService, CaptureStream, SampleSink, StreamDelegate,
};

/// How a reconfiguration ended once the service acknowledged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureOutcome {
    /// The pair is now the session's effective spec.
    Applied,
    /// A newer request was applied first (or the stream is gone); discarded.
    Superseded,
}

/// Observable state, written by the single writer holding the gate, by
/// acknowledgments resolving, or by the service reporting a dead stream.
struct Snapshot {
    state: SessionState,
    effective: Option<SpecPair>,
    /// Latest pair that is applied or still awaiting its acknowledgment.
    /// Output registration follows this pair.
    desired: Option<SpecPair>,
    desired_token: u64,
    issued_token: u64,
    applied_token: u64,
    /// Bumped on every start, so callbacks from an old stream are ignored.
    generation: u64,
}

/// The open stream and which outputs it currently has registered.
struct LiveStream {
    stream: Box<dyn CaptureStream>,
    generation: u64,
    audio_registered: bool,
}

impl LiveStream {
    fn sync_audio_output(&mut self, wanted: bool, shared: &Arc<Shared>) -> Result<(), CaptureError> {
        if wanted == self.audio_registered {
            return Ok(());
        }
        if wanted {
            self.stream
                .add_output(StreamKind::Audio, session_sink(shared, StreamKind::Audio, self.generation))?;
        } else {
            self.stream.remove_output(StreamKind::Audio)?;
        }
        self.audio_registered = wanted;
        Ok(())
    }
}

struct Shared {
    session_id: Uuid,
    gate: Mutex<Option<LiveStream>>,
    snapshot: RwLock<Snapshot>,
    /// Held for reading while a sample is routed; commits take the write side.
    delivery: RwLock<()>,
    in_flight: Mutex<usize>,
    settled: Condvar,
    monitor: Mutex<AudioLevelMonitor>,
    diagnostics: Mutex<DeliveryDiagnostics>,
    delegate: RwLock<Option<Arc<dyn CaptureDelegate>>>,
}

impl Shared {
    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.read().clone()
    }

    fn notify_state(&self, state: SessionState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    /// Mutate the snapshot once in-progress deliveries have returned.
    fn commit<R>(&self, mutate: impl FnOnce(&mut Snapshot) -> R) -> R {
        let _quiesced = self.delivery.write();
        let mut snapshot = self.snapshot.write();
        mutate(&mut snapshot)
    }

    fn set_state(&self, state: SessionState) {
        self.commit(|s| s.state = state);
        self.notify_state(state);
    }

    /// Idle → Starting. Returns the generation of the stream about to open.
    fn begin_start(&self) -> u64 {
        let generation = self.commit(|s| {
            s.state = SessionState::Starting;
            s.generation += 1;
            s.generation
        });
        self.notify_state(SessionState::Starting);
        generation
    }

    /// Starting → Running, unless the stream died while starting.
    fn commit_start(&self, generation: u64, pair: SpecPair) -> bool {
        let committed = self.commit(|s| {
            if s.generation != generation || s.state != SessionState::Starting {
                return false;
            }
            s.state = SessionState::Running;
            s.issued_token += 1;
            s.applied_token = s.issued_token;
            s.desired_token = s.issued_token;
            s.desired = Some(pair.clone());
            s.effective = Some(pair);
            true
        });
        if !committed {
            return false;
        }
        {
            let mut diagnostics = self.diagnostics.lock();
            *diagnostics = DeliveryDiagnostics {
                session_started_at: Some(Utc::now()),
                ..Default::default()
            };
        }
        self.notify_state(SessionState::Running);
        true
    }

    /// Back to Idle, forgetting the stream's specs and levels.
    fn finish_idle(&self) {
        self.commit(|s| {
            s.state = SessionState::Idle;
            s.effective = None;
            s.desired = None;
            self.monitor.lock().reset();
        });
        self.notify_state(SessionState::Idle);
    }

    fn begin_in_flight(&self) {
        *self.in_flight.lock() += 1;
    }

    fn finish_in_flight(&self) {
        let mut count = self.in_flight.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.settled.notify_all();
        }
    }

    /// Wait until no reconfiguration is in flight. False on timeout.
    fn wait_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.in_flight.lock();
        while *count > 0 {
            if self.settled.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Compare-and-apply: only a newer token than the last applied one wins.
    ///
    /// The flag is true when the applied pair became the desired one again
    /// after a newer request was rejected, so outputs must follow it.
    fn apply_reconfiguration(
        &self,
        token: u64,
        generation: u64,
        pair: SpecPair,
    ) -> (ReconfigureOutcome, bool) {
        let (outcome, realign) = self.commit(|s| {
            if s.generation != generation || !s.state.is_running() || token <= s.applied_token {
                return (ReconfigureOutcome::Superseded, false);
            }
            let realign = token > s.desired_token;
            if token >= s.desired_token {
                s.desired = Some(pair.clone());
                s.desired_token = token;
            }
            s.applied_token = token;
            s.effective = Some(pair);
            (ReconfigureOutcome::Applied, realign)
        });

        let mut diagnostics = self.diagnostics.lock();
        match outcome {
            ReconfigureOutcome::Applied => {
                diagnostics.reconfigurations_applied += 1;
                log::info!("[{}] Reconfiguration #{} applied", self.session_id, token);
            }
            ReconfigureOutcome::Superseded => {
                diagnostics.reconfigurations_superseded += 1;
                log::debug!("[{}] Reconfiguration #{} superseded", self.session_id, token);
            }
        }
        (outcome, realign)
    }

    /// Forget a request that will never apply. When it was the latest one,
    /// the effective pair becomes desired again; returns true in that case.
    fn withdraw_reconfiguration(&self, token: u64, generation: u64) -> bool {
        let mut s = self.snapshot.write();
        if s.generation != generation || !s.state.is_running() || token != s.desired_token {
            return false;
        }
        s.desired = s.effective.clone();
        s.desired_token = s.applied_token;
        true
    }

    /// Bring the live stream's audio output in line with the desired pair.
    fn realign_audio_output(self: &Arc<Self>, generation: u64) {
        let mut slot = self.gate.lock();
        let wanted = {
            let s = self.snapshot.read();
            if s.generation != generation || !s.state.is_running() {
                return;
            }
            s.desired.as_ref().map_or(false, |p| p.config.captures_audio)
        };
        let Some(live) = slot.as_mut().filter(|live| live.generation == generation) else {
            return;
        };
        if let Err(e) = live.sync_audio_output(wanted, self) {
            log::warn!("[{}] Failed to restore audio output: {}", self.session_id, e);
        }
    }

    /// The service reported that a stream stopped on its own.
    fn stream_failed(&self, generation: u64, error: CaptureError) {
        let failed = self.commit(|s| {
            let live = matches!(s.state, SessionState::Starting | SessionState::Running);
            if s.generation != generation || !live {
                return false;
            }
            s.state = SessionState::Idle;
            s.effective = None;
            s.desired = None;
            self.monitor.lock().reset();
            true
        });
        if !failed {
            log::debug!("[{}] Ignoring failure from retired stream: {}", self.session_id, error);
            return;
        }
        log::error!("[{}] Capture stream stopped unexpectedly: {}", self.session_id, error);

        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(SessionState::Idle);
            delegate.on_error(&error);
        }
    }

    /// Delivery path: demux one raw buffer and route the result.
    ///
    /// Runs entirely under the delivery read guard, so no state commit lands
    /// while a delegate callback is in progress.
    fn route(&self, kind: StreamKind, generation: u64, buffer: &RawSampleBuffer<'_>) {
        let _delivering = self.delivery.read();
        {
            let s = self.snapshot.read();
            if s.generation != generation || !s.state.accepts_samples() {
                return;
            }
        }

        if !buffer.is_valid() || buffer.is_empty() || buffer.kind() != kind {
            log::trace!("Dropping invalid {} buffer {:?}", kind, buffer);
            self.diagnostics.lock().invalid_buffers += 1;
            return;
        }

        let delegate = self.delegate();
        match demux(buffer) {
            Some(Sample::Video(frame)) => {
                self.diagnostics.lock().video_frames_delivered += 1;
                if let Some(delegate) = delegate {
                    delegate.on_video_frame(&frame);
                }
            }
            Some(Sample::Audio(chunk)) => {
                let levels = {
                    let mut monitor = self.monitor.lock();
                    monitor.ingest(&chunk);
                    monitor.levels()
                };
                {
                    let mut diagnostics = self.diagnostics.lock();
                    diagnostics.audio_chunks_delivered += 1;
                    diagnostics.audio_frames_delivered += chunk.frame_count() as u64;
                }
                if let Some(delegate) = delegate {
                    delegate.on_audio_chunk(&chunk);
                    delegate.on_levels_updated(&levels);
                }
            }
            None => {
                log::trace!("Skipping unusable {} sample at {:?}", kind, buffer.presentation_time());
                let mut diagnostics = self.diagnostics.lock();
                match kind {
                    StreamKind::Video => diagnostics.frames_skipped += 1,
                    StreamKind::Audio => diagnostics.audio_chunks_rejected += 1,
                }
            }
        }
    }
}

/// Sink registered with the service for one delivery path.
struct SessionSink {
    kind: StreamKind,
    generation: u64,
    shared: Arc<Shared>,
}

impl SampleSink for SessionSink {
    fn did_output_sample(&self, buffer: &RawSampleBuffer<'_>) {
        self.shared.route(self.kind, self.generation, buffer);
    }
}

fn session_sink(shared: &Arc<Shared>, kind: StreamKind, generation: u64) -> Arc<dyn SampleSink> {
    Arc::new(SessionSink {
        kind,
        generation,
        shared: Arc::clone(shared),
    })
}

struct SessionStreamDelegate {
    generation: u64,
    shared: Arc<Shared>,
}

impl StreamDelegate for SessionStreamDelegate {
    fn did_stop_with_error(&self, error: CaptureError) {
        self.shared.stream_failed(self.generation, error);
    }
}

/// A reconfiguration that has been sent to the service but not yet acknowledged.
///
/// Call [`wait`](Self::wait) to learn the outcome. Dropping it without
/// waiting abandons the request: the session never applies it and outputs
/// return to the previously effective pair.
pub struct PendingReconfiguration {
    token: u64,
    generation: u64,
    pair: Option<SpecPair>,
    ack: Option<Acknowledgment>,
    timeout: Duration,
    in_flight: bool,
    shared: Arc<Shared>,
}

impl PendingReconfiguration {
    /// Monotonically increasing request token; later requests carry larger ones.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Block until the service acknowledges, then compare-and-apply.
    ///
    /// A rejected update leaves the previously effective pair in place,
    /// including its output registration.
    pub fn wait(mut self) -> Result<ReconfigureOutcome, CaptureError> {
        let (Some(ack), Some(pair)) = (self.ack.take(), self.pair.take()) else {
            return Ok(ReconfigureOutcome::Superseded);
        };
        let (result, realign) = match ack.wait(self.timeout) {
            Ok(()) => {
                let (outcome, realign) =
                    self.shared.apply_reconfiguration(self.token, self.generation, pair);
                (Ok(outcome), realign)
            }
            Err(e) => {
                log::warn!(
                    "[{}] Reconfiguration #{} rejected: {}",
                    self.shared.session_id,
                    self.token,
                    e
                );
                let realign = self.shared.withdraw_reconfiguration(self.token, self.generation);
                (Err(e), realign)
            }
        };

        // A stop waiting on this request holds the gate; release it first.
        self.settle();
        if realign {
            self.shared.realign_audio_output(self.generation);
        }
        result
    }

    fn settle(&mut self) {
        if std::mem::take(&mut self.in_flight) {
            self.shared.finish_in_flight();
        }
    }
}

impl Drop for PendingReconfiguration {
    fn drop(&mut self) {
        let abandoned = self.ack.take().is_some()
            && self.shared.withdraw_reconfiguration(self.token, self.generation);
        self.settle();
        if abandoned {
            log::debug!(
                "[{}] Reconfiguration #{} abandoned",
                self.shared.session_id,
                self.token
            );
            self.shared.realign_audio_output(self.generation);
        }
    }
}

/// Capture session orchestrator.
///
/// Owns the active stream, applies filter/config pairs, and routes demuxed
/// samples to the delegate.
///
/// ```text
///                       ┌→ [video path] → demux → on_video_frame
/// [CaptureService] ─────┤
///                       └→ [audio path] → demux → AudioLevelMonitor → on_audio_chunk
/// ```
///
/// `start`, `stop` and the issuing half of `reconfigure` are serialized by
/// one gate (single writer). Acknowledgments for reconfigurations are awaited
/// outside the gate and resolved by request token, so a late answer to an
/// older request never overwrites a newer one. Delivery callbacks never wait
/// on the service; state commits wait for callbacks already in progress.
pub struct CaptureSession {
    service: Arc<dyn CaptureService>,
    options: SessionOptions,
    shared: Arc<Shared>,
}

impl CaptureSession {
    pub fn new(service: Arc<dyn CaptureService>) -> Self {
        Self::with_options(service, SessionOptions::default())
    }

    pub fn with_options(service: Arc<dyn CaptureService>, options: SessionOptions) -> Self {
        Self {
            service,
            options,
            shared: Arc::new(Shared {
                session_id: Uuid::new_v4(),
                gate: Mutex::new(None),
                snapshot: RwLock::new(Snapshot {
                    state: SessionState::Idle,
                    effective: None,
                    desired: None,
                    desired_token: 0,
                    issued_token: 0,
                    applied_token: 0,
                    generation: 0,
                }),
                delivery: RwLock::new(()),
                in_flight: Mutex::new(0),
                settled: Condvar::new(),
                monitor: Mutex::new(AudioLevelMonitor::new()),
                diagnostics: Mutex::new(DeliveryDiagnostics::default()),
                delegate: RwLock::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.shared.delegate.write() = Some(delegate);
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshot.read().state
    }

    /// The pair currently in effect on the live stream.
    pub fn effective(&self) -> Option<SpecPair> {
        self.shared.snapshot.read().effective.clone()
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.shared.monitor.lock().levels()
    }

    pub fn diagnostics(&self) -> DeliveryDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    pub fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        self.service.shareable_content()
    }

    /// Forward a failure raised outside the session to the delegate.
    pub fn report_error(&self, error: &CaptureError) {
        if let Some(delegate) = self.shared.delegate() {
            delegate.on_error(error);
        }
    }

    /// Open and start a stream. Transitions: idle → starting → running.
    ///
    /// On any failure the session reverts to idle and the error is returned.
    pub fn start(&self, filter: FilterSpec, config: StreamConfigSpec) -> Result<(), CaptureError> {
        let mut slot = self.shared.gate.lock();

        let current = self.state();
        if !current.is_idle() {
            return Err(CaptureError::InvalidTransition {
                from: current,
                operation: "start",
            });
        }
        if let Some(dead) = slot.take() {
            retire_stream(dead.stream);
        }

        let generation = self.shared.begin_start();
        if filter.is_empty() {
            self.shared.set_state(SessionState::Idle);
            return Err(CaptureError::ConfigurationRejected(
                "no capture target selected".into(),
            ));
        }

        log::info!(
            "[{}] Starting capture: {} at {}x{}",
            self.shared.session_id,
            filter.describe(),
            config.width,
            config.height
        );

        let stream = match self.open_stream(&filter, &config, generation) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("[{}] Start rejected: {}", self.shared.session_id, e);
                self.shared.set_state(SessionState::Idle);
                return Err(e);
            }
        };

        let audio_registered = config.captures_audio;
        if !self.shared.commit_start(generation, SpecPair::new(filter, config)) {
            retire_stream(stream);
            return Err(CaptureError::StreamFailed("stream stopped while starting".into()));
        }
        *slot = Some(LiveStream {
            stream,
            generation,
            audio_registered,
        });
        Ok(())
    }

    /// Stop capture. Transitions: running → stopping → idle.
    ///
    /// No-op when already idle. A start still waiting for its acknowledgment
    /// finishes first, and in-flight reconfigurations settle before teardown.
    /// The session always ends idle; an error from the service while
    /// stopping is returned after teardown.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut slot = self.shared.gate.lock();

        if self.state().is_idle() {
            if let Some(dead) = slot.take() {
                retire_stream(dead.stream);
            }
            log::debug!("[{}] Stop ignored: already idle", self.shared.session_id);
            return Ok(());
        }

        if !self.shared.wait_settled(self.options.ack_timeout) {
            log::warn!(
                "[{}] Reconfiguration still unacknowledged, stopping anyway",
                self.shared.session_id
            );
        }

        self.shared.set_state(SessionState::Stopping);
        let result = match slot.take() {
            Some(mut live) => {
                let result = live.stream.stop().wait(self.options.ack_timeout);
                remove_outputs(live.stream.as_mut());
                result
            }
            None => Ok(()),
        };
        self.shared.finish_idle();

        match &result {
            Ok(()) => log::info!("[{}] Capture stopped", self.shared.session_id),
            Err(e) => log::warn!("[{}] Capture stopped with error: {}", self.shared.session_id, e),
        }
        result
    }

    /// Apply a new pair to the live stream and wait for the outcome.
    pub fn reconfigure(
        &self,
        filter: FilterSpec,
        config: StreamConfigSpec,
    ) -> Result<ReconfigureOutcome, CaptureError> {
        self.begin_reconfigure(filter, config)?.wait()
    }

    /// Issue a reconfiguration without waiting for the acknowledgment.
    ///
    /// Valid only while running. The stream is updated in place; there is
    /// no stop/start cycle. Audio output registration follows the new
    /// config's `captures_audio` flag, and reverts if the request is
    /// rejected or abandoned.
    pub fn begin_reconfigure(
        &self,
        filter: FilterSpec,
        config: StreamConfigSpec,
    ) -> Result<PendingReconfiguration, CaptureError> {
        let mut slot = self.shared.gate.lock();

        let (current, generation) = {
            let s = self.shared.snapshot.read();
            (s.state, s.generation)
        };
        let live = match slot.as_mut() {
            Some(live) if current.is_running() => live,
            _ => {
                return Err(CaptureError::InvalidTransition {
                    from: current,
                    operation: "reconfigure",
                })
            }
        };
        if filter.is_empty() {
            return Err(CaptureError::ConfigurationRejected(
                "no capture target selected".into(),
            ));
        }

        live.sync_audio_output(config.captures_audio, &self.shared)?;

        let pair = SpecPair::new(filter, config);
        let token = {
            let mut s = self.shared.snapshot.write();
            s.issued_token += 1;
            s.desired = Some(pair.clone());
            s.desired_token = s.issued_token;
            s.issued_token
        };
        log::info!(
            "[{}] Reconfiguration #{}: {} at {}x{}",
            self.shared.session_id,
            token,
            pair.filter.describe(),
            pair.config.width,
            pair.config.height
        );

        let ack = live.stream.update(&pair.filter, &pair.config);
        self.shared.begin_in_flight();
        Ok(PendingReconfiguration {
            token,
            generation,
            pair: Some(pair),
            ack: Some(ack),
            timeout: self.options.ack_timeout,
            in_flight: true,
            shared: Arc::clone(&self.shared),
        })
    }

    fn open_stream(
        &self,
        filter: &FilterSpec,
        config: &StreamConfigSpec,
        generation: u64,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let delegate: Arc<dyn StreamDelegate> = Arc::new(SessionStreamDelegate {
            generation,
            shared: Arc::clone(&self.shared),
        });
        let mut stream = self.service.open_stream(filter, config, delegate)?;

        let started = self
            .register_outputs(stream.as_mut(), config.captures_audio, generation)
            .and_then(|()| stream.start().wait(self.options.ack_timeout));
        if let Err(e) = started {
            remove_outputs(stream.as_mut());
            return Err(e);
        }
        Ok(stream)
    }

    fn register_outputs(
        &self,
        stream: &mut dyn CaptureStream,
        captures_audio: bool,
        generation: u64,
    ) -> Result<(), CaptureError> {
        stream.add_output(StreamKind::Video, session_sink(&self.shared, StreamKind::Video, generation))?;
        if captures_audio {
            stream.add_output(StreamKind::Audio, session_sink(&self.shared, StreamKind::Audio, generation))?;
        }
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.state().is_idle() {
            return;
        }
        if let Err(e) = self.stop() {
            log::warn!("[{}] Teardown on drop failed: {}", self.shared.session_id, e);
        }
    }
}

fn remove_outputs(stream: &mut dyn CaptureStream) {
    for kind in [StreamKind::Video, StreamKind::Audio] {
        if let Err(e) = stream.remove_output(kind) {
            log::debug!("Failed to remove {} output: {}", kind, e);
        }
    }
}

/// Release a stream the service already reported as stopped.
fn retire_stream(mut stream: Box<dyn CaptureStream>) {
    remove_outputs(stream.as_mut());
}
