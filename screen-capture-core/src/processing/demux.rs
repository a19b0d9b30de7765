use crate::models::media::{AudioChunk, FrameStatus, Sample, SurfaceRef, VideoFrame};
use crate::models::sample_buffer::{AudioFormatDescription, RawSampleBuffer, SampleFormat, StreamKind};

/// Sample rates (Hz) accepted on the audio path.
pub const SUPPORTED_SAMPLE_RATES: [u32; 9] = [
    8_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 88_200, 96_000,
];

/// Mono or stereo only.
pub const MAX_CHANNELS: u16 = 2;

/// Turn a raw buffer into a typed sample.
///
/// Returns `None` for anything that is not a usable sample: incomplete video
/// frames, missing attachments, unsupported or inconsistent audio formats.
/// None of these are errors; the caller simply skips the buffer.
///
/// Video frames borrow the buffer's surface and cannot outlive it. Audio is
/// copied out, since the buffer memory is recycled after the callback.
pub fn demux<'a>(buffer: &RawSampleBuffer<'a>) -> Option<Sample<'a>> {
    match buffer.kind() {
        StreamKind::Video => demux_video(buffer).map(Sample::Video),
        StreamKind::Audio => demux_audio(buffer).map(Sample::Audio),
    }
}

pub fn demux_video<'a>(buffer: &RawSampleBuffer<'a>) -> Option<VideoFrame<'a>> {
    let attachments = buffer.video_attachments()?;
    let status = FrameStatus::from_raw(attachments.status?)?;
    if status != FrameStatus::Complete {
        return None;
    }
    let surface = buffer.surface()?;

    Some(VideoFrame {
        surface: SurfaceRef::new(surface),
        content_rect: attachments.content_rect?,
        content_scale: attachments.content_scale?,
        scale_factor: attachments.scale_factor?,
        status,
        presentation_time: buffer.presentation_time(),
    })
}

pub fn demux_audio(buffer: &RawSampleBuffer<'_>) -> Option<AudioChunk> {
    let format = buffer.audio_format()?;
    if !is_supported_format(&format) {
        return None;
    }
    let frame_count = buffer.frame_count();
    if frame_count == 0 {
        return None;
    }
    let channels = copy_planes(&format, frame_count, buffer.audio_data())?;

    Some(AudioChunk {
        source_format: format.sample_format,
        channel_count: format.channel_count,
        sample_rate: format.sample_rate,
        channels,
        presentation_time: buffer.presentation_time(),
    })
}

/// Whether the audio path can decode this format.
pub fn is_supported_format(format: &AudioFormatDescription) -> bool {
    if format.channel_count == 0 || format.channel_count > MAX_CHANNELS {
        return false;
    }
    if format.sample_rate.fract() != 0.0 {
        return false;
    }
    SUPPORTED_SAMPLE_RATES
        .iter()
        .any(|&rate| rate as f64 == format.sample_rate)
}

/// Decode little-endian samples into one normalized f32 plane per channel.
fn copy_planes(format: &AudioFormatDescription, frame_count: usize, data: &[u8]) -> Option<Vec<Vec<f32>>> {
    let channels = format.channel_count as usize;
    let expected = frame_count
        .checked_mul(channels)?
        .checked_mul(format.sample_format.bytes_per_sample())?;
    if data.len() != expected {
        return None;
    }

    let samples: Vec<f32> = match format.sample_format {
        SampleFormat::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        SampleFormat::I16 => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
    };

    let mut planes = vec![Vec::with_capacity(frame_count); channels];
    if format.interleaved || channels == 1 {
        for (i, sample) in samples.into_iter().enumerate() {
            planes[i % channels].push(sample);
        }
    } else {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane.extend_from_slice(&samples[c * frame_count..(c + 1) * frame_count]);
        }
    }
    Some(planes)
}
