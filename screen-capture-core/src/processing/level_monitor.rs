use crate::models::diagnostics::AudioLevels;
use crate::models::media::AudioChunk;

/// Weight kept from the previous level on each chunk.
pub const DEFAULT_DECAY: f32 = 0.75;

/// Decaying per-channel level meter fed by audio chunks.
///
/// `level = decay × level + (1 − decay) × rms(chunk)`, per channel.
/// Pure accumulator; the session resets it when capture stops.
#[derive(Debug, Clone)]
pub struct AudioLevelMonitor {
    decay: f32,
    levels: Vec<f32>,
    peak: f32,
}

impl AudioLevelMonitor {
    pub fn new() -> Self {
        Self::with_decay(DEFAULT_DECAY)
    }

    pub fn with_decay(decay: f32) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            levels: Vec::new(),
            peak: 0.0,
        }
    }

    pub fn ingest(&mut self, chunk: &AudioChunk) {
        if self.levels.len() != chunk.channels.len() {
            self.levels.resize(chunk.channels.len(), 0.0);
        }
        let mut peak = 0.0f32;
        for (level, plane) in self.levels.iter_mut().zip(&chunk.channels) {
            let rms = rms_level(plane).min(1.0);
            *level = self.decay * *level + (1.0 - self.decay) * rms;
            peak = peak.max(peak_level(plane));
        }
        self.peak = peak.min(1.0);
    }

    pub fn levels(&self) -> AudioLevels {
        AudioLevels {
            channels: self.levels.clone(),
            peak: self.peak,
        }
    }

    pub fn reset(&mut self) {
        self.levels.clear();
        self.peak = 0.0;
    }
}

impl Default for AudioLevelMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS level of samples (0.0–1.0 for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
