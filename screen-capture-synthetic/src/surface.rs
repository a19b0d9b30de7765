//! Generated BGRA pixel surfaces.

use screen_capture_core::models::sample_buffer::PixelSurface;

const BYTES_PER_PIXEL: usize = 4;

/// CPU-backed stand-in for a hardware surface.
///
/// The buffer is allocated once per size and restamped for every frame, the
/// way a platform recycles surfaces from its pool.
#[derive(Debug, Clone)]
pub struct SyntheticSurface {
    id: u64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SyntheticSurface {
    /// A surface filled with a horizontal gradient.
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        let row = width as usize * BYTES_PER_PIXEL;
        let mut pixels = vec![0u8; row * height as usize];
        for line in pixels.chunks_exact_mut(row.max(1)) {
            for (x, px) in line.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let shade = (x * 255 / width.max(1) as usize) as u8;
                px.copy_from_slice(&[shade, shade / 2, 255 - shade, 255]);
            }
        }
        Self {
            id,
            width,
            height,
            pixels,
        }
    }

    /// Write `frame_index` into the first pixels so consecutive frames differ.
    pub fn stamp(&mut self, frame_index: u64) {
        let stamp = frame_index.to_le_bytes();
        let len = stamp.len().min(self.pixels.len());
        self.pixels[..len].copy_from_slice(&stamp[..len]);
    }

    pub fn stamped_frame(&self) -> Option<u64> {
        let bytes: [u8; 8] = self.pixels.get(..8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    pub fn matches_size(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl PixelSurface for SyntheticSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bytes_per_row(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
