use std::fmt;

use serde::Serialize;

use super::config::MediaTime;
use super::sample_buffer::{PixelSurface, SampleFormat};
use super::target::Rect;

/// Status the capture service attaches to each video buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Complete,
    Idle,
    Blank,
    Suspended,
    Started,
    Stopped,
}

impl FrameStatus {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Complete),
            1 => Some(Self::Idle),
            2 => Some(Self::Blank),
            3 => Some(Self::Suspended),
            4 => Some(Self::Started),
            5 => Some(Self::Stopped),
            _ => None,
        }
    }

    pub fn raw(&self) -> i64 {
        match self {
            Self::Complete => 0,
            Self::Idle => 1,
            Self::Blank => 2,
            Self::Suspended => 3,
            Self::Started => 4,
            Self::Stopped => 5,
        }
    }
}

/// Non-owning handle to the pixel surface behind a video frame.
///
/// Bound to the delivery callback. Consumers that need the pixels later
/// must copy them out with [`SurfaceRef::copy_pixels`].
#[derive(Clone, Copy)]
pub struct SurfaceRef<'a> {
    surface: &'a dyn PixelSurface,
}

impl<'a> SurfaceRef<'a> {
    pub fn new(surface: &'a dyn PixelSurface) -> Self {
        Self { surface }
    }

    pub fn id(&self) -> u64 {
        self.surface.id()
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn bytes_per_row(&self) -> usize {
        self.surface.bytes_per_row()
    }

    pub fn pixels(&self) -> &'a [u8] {
        self.surface.pixels()
    }

    pub fn copy_pixels(&self) -> Vec<u8> {
        self.surface.pixels().to_vec()
    }
}

impl fmt::Debug for SurfaceRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRef")
            .field("id", &self.id())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// A complete video frame, valid for the duration of one delivery callback.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    pub surface: SurfaceRef<'a>,
    pub content_rect: Rect,
    pub content_scale: f64,
    pub scale_factor: f64,
    pub status: FrameStatus,
    pub presentation_time: MediaTime,
}

/// Audio samples copied out of a raw buffer. Owned, so it may be retained.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Encoding of the source buffer. Samples below are always normalized f32.
    pub source_format: SampleFormat,
    pub channel_count: u16,
    pub sample_rate: f64,
    /// One plane of samples per channel.
    pub channels: Vec<Vec<f32>>,
    pub presentation_time: MediaTime,
}

impl AudioChunk {
    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate
    }

    /// Interleave the planes into `[L0, R0, L1, R1, ...]`.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for plane in &self.channels {
                out.push(plane.get(i).copied().unwrap_or(0.0));
            }
        }
        out
    }
}

/// Typed output of the demultiplexer.
#[derive(Debug)]
pub enum Sample<'a> {
    Video(VideoFrame<'a>),
    Audio(AudioChunk),
}
