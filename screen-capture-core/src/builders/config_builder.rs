use crate::models::config::{
    AudioFlags, MediaTime, StreamConfigSpec, DEFAULT_CHANNEL_COUNT, DEFAULT_SAMPLE_RATE,
    MAX_QUEUE_DEPTH,
};
use crate::models::target::{CaptureTarget, Size};

/// Window captures render at twice their frame size.
pub const WINDOW_MAGNIFICATION: f64 = 2.0;

/// Fastest frame cadence requested from the service: 60 fps.
pub const MIN_FRAME_INTERVAL: MediaTime = MediaTime::new(1, 60);

/// Derive the stream configuration for a target.
///
/// Displays are captured at `resolution × scale_factor`. Windows ignore the
/// scale factor and are captured at `frame × WINDOW_MAGNIFICATION`, since a
/// window is usually much smaller than a display and benefits from the
/// extra pixels. `queue_depth` is clamped to `1..=MAX_QUEUE_DEPTH`.
pub fn build_config(
    target: &CaptureTarget,
    audio: AudioFlags,
    scale_factor: f64,
    queue_depth: usize,
) -> StreamConfigSpec {
    let size = match target {
        CaptureTarget::Display(display) => scaled(display.resolution, sanitize_scale(scale_factor)),
        CaptureTarget::Window(window) => scaled(window.frame.size(), WINDOW_MAGNIFICATION),
    };

    StreamConfigSpec {
        width: pixels(size.width),
        height: pixels(size.height),
        captures_audio: audio.captures_audio,
        excludes_own_process_audio: audio.excludes_own_process_audio,
        min_frame_interval: MIN_FRAME_INTERVAL,
        queue_depth: clamp_queue_depth(queue_depth),
        sample_rate: DEFAULT_SAMPLE_RATE,
        channel_count: DEFAULT_CHANNEL_COUNT,
    }
}

/// Scale factor to use for `target` when the caller has no override.
pub fn native_scale_factor(target: &CaptureTarget) -> f64 {
    match target {
        CaptureTarget::Display(display) => display.scale_factor,
        CaptureTarget::Window(_) => 1.0,
    }
}

fn clamp_queue_depth(requested: usize) -> usize {
    let depth = requested.clamp(1, MAX_QUEUE_DEPTH);
    if depth != requested {
        log::warn!("Queue depth {} out of range, using {}", requested, depth);
    }
    depth
}

fn sanitize_scale(scale_factor: f64) -> f64 {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        log::warn!("Invalid scale factor {}, using 1.0", scale_factor);
        1.0
    }
}

fn scaled(size: Size, factor: f64) -> Size {
    Size::new(size.width * factor, size.height * factor)
}

fn pixels(points: f64) -> u32 {
    if !points.is_finite() || points < 1.0 {
        return 1;
    }
    points.round().min(u32::MAX as f64) as u32
}
