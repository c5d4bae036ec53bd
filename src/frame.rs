//! Frame and image containers that flow through the recognition pipeline.
//!
//! - `RawFrame`: sensor pixel buffer plus geometry, format and capture time.
//! - `NormalizedImage`: upright RGB still handed to a recognition backend.
//! - `FrameSink`: where a camera device pushes frames and session changes.
//!
//! Neither container implements `Clone`. A frame is owned by exactly one
//! pipeline pass and an image by exactly one recognition request, so each
//! buffer is released once, when its owner drops it.

use image::RgbImage;
use zeroize::Zeroize;

// ----------------------------------------------------------------------------
// PixelFormat
// ----------------------------------------------------------------------------

/// Pixel layout of a raw sensor buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Y plane followed by interleaved V/U (the preview default of most sensors).
    Nv21,
    /// Y plane followed by interleaved U/V.
    Nv12,
    /// Packed Y0 U Y1 V.
    Yuyv,
    /// Packed 8-bit RGB.
    Rgb24,
}

impl PixelFormat {
    /// Number of bytes a `width` x `height` buffer occupies in this format.
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            PixelFormat::Nv21 | PixelFormat::Nv12 => {
                // One interleaved chroma pair per 2x2 block, rounding odd edges up.
                let blocks = (width.div_ceil(2) as usize).checked_mul(height.div_ceil(2) as usize)?;
                pixels.checked_add(blocks.checked_mul(2)?)
            }
            PixelFormat::Yuyv => pixels.checked_mul(2),
            PixelFormat::Rgb24 => pixels.checked_mul(3),
        }
    }
}

// ----------------------------------------------------------------------------
// RawFrame
// ----------------------------------------------------------------------------

/// Raw sensor frame. Produced by a camera device, consumed by one pipeline pass.
pub struct RawFrame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Capture time in milliseconds on the device's monotonic clock.
    pub timestamp_ms: u64,
}

impl RawFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp_ms,
        }
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// NormalizedImage
// ----------------------------------------------------------------------------

/// Upright RGB still suitable for recognition input.
pub struct NormalizedImage {
    image: RgbImage,
}

impl NormalizedImage {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the pixel grid. Backends must not retain it past `recognize`.
    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }
}

impl Drop for NormalizedImage {
    fn drop(&mut self) {
        let pixels: &mut [u8] = &mut self.image;
        pixels.zeroize();
    }
}

impl std::fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// FrameSink
// ----------------------------------------------------------------------------

/// Receiver of frames from a camera device's delivery thread.
///
/// `on_frame` is called once per available frame and must return quickly;
/// anything slower than one normalization pass belongs on another thread.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: RawFrame);

    /// A camera session with this generation is about to start streaming.
    fn on_session_started(&self, _generation: u64) {}

    /// The session with this generation was torn down.
    fn on_session_ended(&self, _generation: u64) {}
}
