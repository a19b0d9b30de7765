use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::StreamConfigSpec;
use crate::models::content::ShareableContent;
use crate::models::error::CaptureError;
use crate::models::filter::FilterSpec;
use crate::models::sample_buffer::{RawSampleBuffer, StreamKind};

/// Receives raw buffers on one delivery path.
///
/// The buffer is only valid for the duration of the call.
pub trait SampleSink: Send + Sync {
    fn did_output_sample(&self, buffer: &RawSampleBuffer<'_>);
}

/// Receives stream lifecycle failures the service detects on its own.
pub trait StreamDelegate: Send + Sync {
    /// The stream stopped without being asked to (display unplugged,
    /// permission revoked, target closed). Never called from inside a
    /// `SampleSink` callback.
    fn did_stop_with_error(&self, error: CaptureError);
}

/// Platform capture service.
///
/// Implemented by backends (`SyntheticCaptureService`, future
/// ScreenCaptureKit / Windows.Graphics.Capture backends).
pub trait CaptureService: Send + Sync {
    /// Displays, windows and applications that can currently be captured.
    fn shareable_content(&self) -> Result<ShareableContent, CaptureError>;

    /// Create a stream for `filter` and `config`. The stream is not started.
    ///
    /// A service hosts at most one live stream; opening a second one fails
    /// with `CaptureError::StreamAlreadyActive`.
    fn open_stream(
        &self,
        filter: &FilterSpec,
        config: &StreamConfigSpec,
        delegate: Arc<dyn StreamDelegate>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A stream created by a `CaptureService`.
pub trait CaptureStream: Send {
    /// Register `sink` for one delivery path, replacing any previous sink.
    fn add_output(&mut self, kind: StreamKind, sink: Arc<dyn SampleSink>) -> Result<(), CaptureError>;

    /// Unregister the sink for a delivery path. No-op if none is registered.
    fn remove_output(&mut self, kind: StreamKind) -> Result<(), CaptureError>;

    fn start(&mut self) -> Acknowledgment;

    fn stop(&mut self) -> Acknowledgment;

    /// Apply a new filter and config to the running stream without restarting it.
    fn update(&mut self, filter: &FilterSpec, config: &StreamConfigSpec) -> Acknowledgment;
}

type AckResult = Result<(), CaptureError>;

/// Completion of a request sent to the capture service.
///
/// Either already resolved, or resolved later from another thread through
/// the paired `AckSender`.
#[derive(Debug)]
pub struct Acknowledgment {
    inner: AckInner,
}

#[derive(Debug)]
enum AckInner {
    Ready(AckResult),
    Pending(Receiver<AckResult>),
}

/// Resolves a pending `Acknowledgment`. Dropping it unresolved reports
/// `CaptureError::ServiceUnavailable` to the waiter.
#[derive(Debug)]
pub struct AckSender {
    tx: Sender<AckResult>,
}

impl AckSender {
    pub fn send(self, result: AckResult) {
        // The waiter may have timed out already.
        let _ = self.tx.send(result);
    }

    pub fn succeed(self) {
        self.send(Ok(()));
    }

    pub fn fail(self, error: CaptureError) {
        self.send(Err(error));
    }
}

impl Acknowledgment {
    pub fn ready(result: AckResult) -> Self {
        Self {
            inner: AckInner::Ready(result),
        }
    }

    pub fn ok() -> Self {
        Self::ready(Ok(()))
    }

    pub fn failed(error: CaptureError) -> Self {
        Self::ready(Err(error))
    }

    pub fn pending() -> (AckSender, Self) {
        let (tx, rx) = mpsc::channel();
        (
            AckSender { tx },
            Self {
                inner: AckInner::Pending(rx),
            },
        )
    }

    /// Block until the service answers or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> AckResult {
        match self.inner {
            AckInner::Ready(result) => result,
            AckInner::Pending(rx) => match rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout),
                Err(RecvTimeoutError::Disconnected) => Err(CaptureError::ServiceUnavailable),
            },
        }
    }
}
