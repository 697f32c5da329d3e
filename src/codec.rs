//! Plain image decoding and encoding.
//!
//! Images that are not tiled pyramids are decoded whole into an
//! interleaved `f32` buffer, and crops are encoded back to files.
//!
//! # Numeric Range
//!
//! - **Decode**: sample values are kept as stored. 8-bit images give
//!   `0..=255`, 16-bit images `0..=65535`, float images their own values.
//! - **Encode**: PNG and TIFF outputs are written with 16-bit samples,
//!   every other format with 8-bit samples. Values are rounded and
//!   saturated into the target range; NaN becomes zero.
//!
//! The identifier `"-"` reads from standard input on decode and writes PNG
//! to standard output on encode.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader};

use crate::error::CodecError;
use crate::format::STDIN_IDENTIFIER;

// =============================================================================
// Decoded Image
// =============================================================================

/// A decoded image: interleaved samples, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the image at `path`, or standard input for `"-"`.
pub fn decode(path: &str) -> Result<DecodedImage, CodecError> {
    let image = if path == STDIN_IDENTIFIER {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| CodecError::Io {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        decode_bytes(path, &bytes)?
    } else {
        ImageReader::open(path)
            .map_err(|e| CodecError::Io {
                path: path.to_string(),
                message: e.to_string(),
            })?
            .with_guessed_format()
            .map_err(|e| CodecError::Io {
                path: path.to_string(),
                message: e.to_string(),
            })?
            .decode()
            .map_err(|e| CodecError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?
    };

    Ok(to_samples(image))
}

/// Decode an in-memory encoded image; `name` is used in errors only.
pub fn decode_bytes(name: &str, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Io {
            path: name.to_string(),
            message: e.to_string(),
        })?
        .decode()
        .map_err(|e| CodecError::Decode {
            path: name.to_string(),
            message: e.to_string(),
        })
}

/// Flatten a decoded image into `f32` samples without rescaling.
fn to_samples(image: DynamicImage) -> DecodedImage {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let (data, channels): (Vec<f32>, usize) = match image {
        DynamicImage::ImageLuma8(b) => (widen(b.as_raw()), 1),
        DynamicImage::ImageLumaA8(b) => (widen(b.as_raw()), 2),
        DynamicImage::ImageRgb8(b) => (widen(b.as_raw()), 3),
        DynamicImage::ImageRgba8(b) => (widen(b.as_raw()), 4),
        DynamicImage::ImageLuma16(b) => (widen(b.as_raw()), 1),
        DynamicImage::ImageLumaA16(b) => (widen(b.as_raw()), 2),
        DynamicImage::ImageRgb16(b) => (widen(b.as_raw()), 3),
        DynamicImage::ImageRgba16(b) => (widen(b.as_raw()), 4),
        DynamicImage::ImageRgb32F(b) => (b.into_raw(), 3),
        DynamicImage::ImageRgba32F(b) => (b.into_raw(), 4),
        other => (other.to_rgba32f().into_raw(), 4),
    };

    DecodedImage {
        data,
        width,
        height,
        channels,
    }
}

fn widen<T: Copy + Into<f32>>(raw: &[T]) -> Vec<f32> {
    raw.iter().map(|&v| v.into()).collect()
}

// =============================================================================
// Encoding
// =============================================================================

/// Whether `path` is written with 16-bit samples.
pub fn uses_sixteen_bits(path: &str) -> bool {
    if path == STDIN_IDENTIFIER {
        return true;
    }
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "tif" | "tiff"))
        .unwrap_or(false)
}

/// Encode an interleaved buffer to `path`; the format follows the extension.
pub fn encode(
    path: &str,
    buffer: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<(), CodecError> {
    let expected = width * height * channels;
    if buffer.len() != expected {
        return Err(CodecError::SizeMismatch {
            expected,
            actual: buffer.len(),
        });
    }

    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(CodecError::Encode {
                path: path.to_string(),
                message: format!("{}x{} exceeds the encoder limits", width, height),
            })
        }
    };

    let image = if uses_sixteen_bits(path) {
        let samples = buffer.iter().map(|&v| quantize_u16(v)).collect();
        sixteen_bit_image(samples, w, h, channels)?
    } else {
        let samples = buffer.iter().map(|&v| quantize_u8(v)).collect();
        eight_bit_image(samples, w, h, channels)?
    };

    if path == STDIN_IDENTIFIER {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| encode_error(path, e))?;
        return std::io::stdout()
            .write_all(&bytes)
            .map_err(|e| CodecError::Io {
                path: path.to_string(),
                message: e.to_string(),
            });
    }

    image.save(path).map_err(|e| encode_error(path, e))
}

fn encode_error(path: &str, e: image::ImageError) -> CodecError {
    CodecError::Encode {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[inline]
fn quantize_u8(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round() as u8
    }
}

#[inline]
fn quantize_u16(value: f32) -> u16 {
    if value.is_nan() {
        0
    } else {
        value.round() as u16
    }
}

fn eight_bit_image(
    samples: Vec<u8>,
    w: u32,
    h: u32,
    channels: usize,
) -> Result<DynamicImage, CodecError> {
    let len = samples.len();
    let mismatch = || CodecError::SizeMismatch {
        expected: w as usize * h as usize * channels,
        actual: len,
    };

    Ok(match channels {
        1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        4 => DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        n => return Err(CodecError::UnsupportedChannels(n)),
    })
}

fn sixteen_bit_image(
    samples: Vec<u16>,
    w: u32,
    h: u32,
    channels: usize,
) -> Result<DynamicImage, CodecError> {
    let len = samples.len();
    let mismatch = || CodecError::SizeMismatch {
        expected: w as usize * h as usize * channels,
        actual: len,
    };

    Ok(match channels {
        1 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        2 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        3 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        4 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(w, h, samples).ok_or_else(mismatch)?),
        n => return Err(CodecError::UnsupportedChannels(n)),
    })
}

// =============================================================================
// Tests
// =============================================================================
