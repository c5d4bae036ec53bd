//! Raw frame to still image normalization.
//!
//! One pass runs, in order:
//! 1. color conversion of the sensor buffer to RGB and a full-frame JPEG encode,
//! 2. a JPEG decode back into a pixel grid,
//! 3. a fixed rotation that turns the landscape capture upright.
//!
//! Each step owns fresh buffers. Intermediates are dropped as soon as the next
//! step has produced its output, and on an early return every buffer already
//! allocated is dropped with the stack frame.

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ExtendedColorType, ImageFormat, RgbImage};

use crate::frame::{NormalizedImage, PixelFormat, RawFrame};

pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Clockwise rotation applied after decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    None,
    /// Portrait-mounted sensor on a landscape capture geometry.
    #[default]
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(anyhow!(
                "unsupported rotation {} degrees; expected 0, 90, 180 or 270",
                other
            )),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// Converts admitted frames into upright still images.
#[derive(Clone, Debug)]
pub struct Normalizer {
    jpeg_quality: u8,
    rotation: Rotation,
}

impl Normalizer {
    pub fn new(jpeg_quality: u8, rotation: Rotation) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
            rotation,
        }
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Run the encode, decode and rotate steps on one frame.
    pub fn normalize(&self, frame: &RawFrame) -> Result<NormalizedImage> {
        let jpeg = {
            let rgb = normalize_to_rgb(frame.pixels(), frame.width, frame.height, frame.format)?;
            encode_jpeg(&rgb, frame.width, frame.height, self.jpeg_quality)?
        };
        log::debug!(
            "normalize: {}x{} {:?} frame compressed to {} bytes",
            frame.width,
            frame.height,
            frame.format,
            jpeg.len()
        );

        let decoded = decode_jpeg(&jpeg)?;
        drop(jpeg);

        let upright = rotate(&decoded, self.rotation);
        drop(decoded);

        Ok(NormalizedImage::new(upright))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY, Rotation::default())
    }
}

/// Encode an RGB buffer as JPEG, covering the full frame.
pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    Ok(out)
}

/// Decode JPEG bytes into an RGB grid. Empty or malformed input is an error.
pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        bail!("cannot decode an empty still image buffer");
    }
    let image =
        image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).context("decode jpeg")?;
    Ok(image.into_rgb8())
}

pub fn rotate(image: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::None => image.clone(),
        Rotation::Cw90 => imageops::rotate90(image),
        Rotation::Cw180 => imageops::rotate180(image),
        Rotation::Cw270 => imageops::rotate270(image),
    }
}

// ----------------------------------------------------------------------------
// Color conversion
// ----------------------------------------------------------------------------

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        bail!("frame has empty geometry {}x{}", width, height);
    }
    let expected = format
        .frame_len(width, height)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }

    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Nv12 => Ok(semi_planar_to_rgb(pixels, width, height, false)),
        PixelFormat::Nv21 => Ok(semi_planar_to_rgb(pixels, width, height, true)),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(pixels, width, height)),
    }
}

/// NV12 (`vu_order == false`) or NV21 (`vu_order == true`) to RGB.
fn semi_planar_to_rgb(pixels: &[u8], width: u32, height: u32, vu_order: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w * h;
    // Odd widths still carry one chroma pair per two columns.
    let chroma_stride = w.div_ceil(2) * 2;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * chroma_stride + (i / 2) * 2;
            let (u, v) = if vu_order {
                (pixels[uv_index + 1], pixels[uv_index])
            } else {
                (pixels[uv_index], pixels[uv_index + 1])
            };
            write_rgb(&mut rgb, j * w + i, y, u, v);
        }
    }
    rgb
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = vec![0u8; pixel_count * 3];
    for (pair, chunk) in pixels.chunks_exact(4).enumerate() {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        write_rgb(&mut rgb, pair * 2, y0 as f32, u, v);
        if pair * 2 + 1 < pixel_count {
            write_rgb(&mut rgb, pair * 2 + 1, y1 as f32, u, v);
        }
    }
    rgb
}

fn write_rgb(rgb: &mut [u8], pixel: usize, y: f32, u: u8, v: u8) {
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;

    let offset = pixel * 3;
    rgb[offset] = clamp_to_u8(r);
    rgb[offset + 1] = clamp_to_u8(g);
    rgb[offset + 2] = clamp_to_u8(b);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
