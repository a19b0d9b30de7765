use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{AudioFlags, DEFAULT_QUEUE_DEPTH, MAX_QUEUE_DEPTH};
use super::error::CaptureError;
use super::target::ExclusionSet;

/// User-facing capture preferences.
///
/// Loaded by the UI/config layer (JSON); persistence is the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Overrides the display's own backing scale factor when set.
    pub scale_factor: Option<f64>,

    /// Surfaces kept in flight by the service (default: 3, max: 8).
    pub queue_depth: usize,

    /// Capture system audio alongside video (default: false).
    pub captures_audio: bool,

    /// Leave this process's own audio out of the capture (default: true).
    pub excludes_own_process_audio: bool,

    /// Applications removed from display captures.
    pub excluded_bundle_ids: BTreeSet<String>,

    /// How long to wait for the service to acknowledge a request.
    pub ack_timeout_ms: u64,
}

impl CaptureSettings {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| CaptureError::InvalidSettings(e.to_string()))?;
        settings.validate().map_err(CaptureError::InvalidSettings)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(scale) = self.scale_factor {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(format!("scale factor must be positive: {}", scale));
            }
        }
        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            return Err(format!(
                "queue depth must be between 1 and {}: {}",
                MAX_QUEUE_DEPTH, self.queue_depth
            ));
        }
        if self.ack_timeout_ms == 0 {
            return Err("ack timeout must be non-zero".into());
        }
        Ok(())
    }

    pub fn audio_flags(&self) -> AudioFlags {
        AudioFlags::new(self.captures_audio, self.excludes_own_process_audio)
    }

    pub fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::with_bundle_ids(self.excluded_bundle_ids.iter().cloned())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            scale_factor: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            captures_audio: false,
            excludes_own_process_audio: true,
            excluded_bundle_ids: BTreeSet::new(),
            ack_timeout_ms: 10_000,
        }
    }
}

/// Tuning for a `CaptureSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Upper bound on waiting for any service acknowledgment.
    pub ack_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        CaptureSettings::default().session_options()
    }
}
