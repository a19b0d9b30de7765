use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::filter::FilterSpec;

/// Default number of surfaces the service keeps in flight.
pub const DEFAULT_QUEUE_DEPTH: usize = 3;

/// Upper bound on queue depth. Deeper queues grow the platform's surface pool.
pub const MAX_QUEUE_DEPTH: usize = 8;

/// Audio format requested from the capture service.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNEL_COUNT: u16 = 2;

/// Rational media time, `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime { value: 0, timescale: 1 };

    pub const fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub fn seconds(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }

    pub fn to_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds().max(0.0))
    }
}

/// Audio capture toggles chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioFlags {
    pub captures_audio: bool,
    pub excludes_own_process_audio: bool,
}

impl AudioFlags {
    pub fn new(captures_audio: bool, excludes_own_process_audio: bool) -> Self {
        Self {
            captures_audio,
            excludes_own_process_audio,
        }
    }
}

/// Immutable stream configuration handed to the capture service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamConfigSpec {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    pub captures_audio: bool,
    pub excludes_own_process_audio: bool,
    pub min_frame_interval: MediaTime,
    pub queue_depth: usize,
    pub sample_rate: u32,
    pub channel_count: u16,
}

impl StreamConfigSpec {
    pub fn audio_flags(&self) -> AudioFlags {
        AudioFlags::new(self.captures_audio, self.excludes_own_process_audio)
    }
}

/// A filter and the config derived for it. The two are only ever applied together.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPair {
    pub filter: FilterSpec,
    pub config: StreamConfigSpec,
}

impl SpecPair {
    pub fn new(filter: FilterSpec, config: StreamConfigSpec) -> Self {
        Self { filter, config }
    }
}
