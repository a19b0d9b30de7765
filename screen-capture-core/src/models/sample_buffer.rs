use std::fmt;

use serde::Serialize;

use super::config::MediaTime;
use super::target::Rect;

/// Which delivery path a buffer arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// Hardware-backed pixel storage owned by the capture service.
///
/// Implemented by backends. The core only ever sees it through a borrow.
pub trait PixelSurface: Send + Sync {
    fn id(&self) -> u64;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn bytes_per_row(&self) -> usize;
    /// Locked view of the pixel data, valid while the surface is borrowed.
    fn pixels(&self) -> &[u8];
}

/// Per-frame metadata the service attaches to a video buffer.
///
/// Every field is optional because the service omits attachments on
/// transient frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoAttachments {
    /// Raw frame status code, see `FrameStatus::from_raw`.
    pub status: Option<i64>,
    pub content_rect: Option<Rect>,
    pub content_scale: Option<f64>,
    pub scale_factor: Option<f64>,
}

/// Sample encoding inside an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32,
    I16,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::I16 => 2,
        }
    }
}

/// Format description carried by an audio buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormatDescription {
    pub sample_rate: f64,
    pub channel_count: u16,
    pub sample_format: SampleFormat,
    /// Interleaved `[L0, R0, L1, R1, ...]` when true, one plane per channel otherwise.
    pub interleaved: bool,
}

enum Payload<'a> {
    Video {
        attachments: VideoAttachments,
        surface: Option<&'a dyn PixelSurface>,
    },
    Audio {
        format: Option<AudioFormatDescription>,
        frame_count: usize,
        data: &'a [u8],
    },
}

/// A captured sample borrowed from the capture service for one callback.
///
/// The lifetime `'a` is the buffer's validity window: the service recycles
/// the memory when the delivery callback returns, so nothing derived from
/// this buffer can outlive the call.
pub struct RawSampleBuffer<'a> {
    presentation_time: MediaTime,
    valid: bool,
    payload: Payload<'a>,
}

impl<'a> RawSampleBuffer<'a> {
    pub fn video(
        presentation_time: MediaTime,
        attachments: VideoAttachments,
        surface: Option<&'a dyn PixelSurface>,
    ) -> Self {
        Self {
            presentation_time,
            valid: true,
            payload: Payload::Video { attachments, surface },
        }
    }

    pub fn audio(
        presentation_time: MediaTime,
        format: Option<AudioFormatDescription>,
        frame_count: usize,
        data: &'a [u8],
    ) -> Self {
        Self {
            presentation_time,
            valid: true,
            payload: Payload::Audio {
                format,
                frame_count,
                data,
            },
        }
    }

    /// Mark the buffer as malformed, as the service does for corrupt samples.
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn kind(&self) -> StreamKind {
        match self.payload {
            Payload::Video { .. } => StreamKind::Video,
            Payload::Audio { .. } => StreamKind::Audio,
        }
    }

    pub fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True when the buffer carries no sample data at all.
    pub fn is_empty(&self) -> bool {
        match &self.payload {
            Payload::Video { attachments, surface } => {
                surface.is_none() && *attachments == VideoAttachments::default()
            }
            Payload::Audio {
                frame_count, data, ..
            } => *frame_count == 0 || data.is_empty(),
        }
    }

    pub fn video_attachments(&self) -> Option<&VideoAttachments> {
        match &self.payload {
            Payload::Video { attachments, .. } => Some(attachments),
            Payload::Audio { .. } => None,
        }
    }

    pub fn surface(&self) -> Option<&'a dyn PixelSurface> {
        match self.payload {
            Payload::Video { surface, .. } => surface,
            Payload::Audio { .. } => None,
        }
    }

    pub fn audio_format(&self) -> Option<AudioFormatDescription> {
        match self.payload {
            Payload::Audio { format, .. } => format,
            Payload::Video { .. } => None,
        }
    }

    pub fn frame_count(&self) -> usize {
        match self.payload {
            Payload::Audio { frame_count, .. } => frame_count,
            Payload::Video { .. } => 0,
        }
    }

    pub fn audio_data(&self) -> &'a [u8] {
        match self.payload {
            Payload::Audio { data, .. } => data,
            Payload::Video { .. } => &[],
        }
    }
}

impl fmt::Debug for RawSampleBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSampleBuffer")
            .field("kind", &self.kind())
            .field("presentation_time", &self.presentation_time)
            .field("valid", &self.valid)
            .field("empty", &self.is_empty())
            .finish()
    }
}
