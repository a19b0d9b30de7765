use chrono::{DateTime, Utc};
use serde::Serialize;

/// Real-time audio level metering, 0.0–1.0.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AudioLevels {
    /// Decayed running level per channel.
    pub channels: Vec<f32>,
    /// Peak absolute sample of the most recent chunk, across channels.
    pub peak: f32,
}

impl AudioLevels {
    /// Loudest channel level, for single-bar meters.
    pub fn max_level(&self) -> f32 {
        self.channels.iter().copied().fold(0.0f32, f32::max)
    }
}

/// Counters for debugging a capture session.
///
/// Per-buffer anomalies are never reported as errors; they are tallied here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryDiagnostics {
    pub session_started_at: Option<DateTime<Utc>>,
    pub video_frames_delivered: u64,
    pub audio_chunks_delivered: u64,
    pub audio_frames_delivered: u64,
    /// Malformed or zero-length buffers.
    pub invalid_buffers: u64,
    /// Video buffers with a non-complete status or a missing attachment.
    pub frames_skipped: u64,
    /// Audio buffers with an unsupported or inconsistent format.
    pub audio_chunks_rejected: u64,
    /// Reconfigurations acknowledged after a newer one was applied.
    pub reconfigurations_superseded: u64,
    pub reconfigurations_applied: u64,
}
