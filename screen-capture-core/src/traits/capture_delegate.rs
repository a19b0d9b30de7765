use crate::models::diagnostics::AudioLevels;
use crate::models::error::CaptureError;
use crate::models::media::{AudioChunk, VideoFrame};
use crate::models::state::SessionState;

/// Event delegate for capture session output.
///
/// Video and audio callbacks run on the service's delivery threads,
/// concurrently with each other. Implementations should be quick and
/// marshal to a UI thread themselves if needed. Session state commits wait
/// for in-progress video and audio callbacks, so those callbacks must not
/// call `start`, `stop` or `reconfigure` on the session themselves.
///
/// `VideoFrame` borrows the service's surface for the duration of the call;
/// copy the pixels out if they are needed afterwards.
pub trait CaptureDelegate: Send + Sync {
    /// Called after every session state transition.
    fn on_state_changed(&self, _state: SessionState) {}

    /// Called for each complete video frame, in capture order.
    fn on_video_frame(&self, _frame: &VideoFrame<'_>) {}

    /// Called for each decoded audio chunk, in capture order.
    fn on_audio_chunk(&self, _chunk: &AudioChunk) {}

    /// Called after each audio chunk with the updated meter values.
    fn on_levels_updated(&self, _levels: &AudioLevels) {}

    /// Called when the stream fails on its own or a picker-driven request fails.
    fn on_error(&self, _error: &CaptureError) {}
}
