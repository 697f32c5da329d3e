//! TIFF validation for the tiled octave store.
//!
//! Octave files are rejected early, with a precise error, when they fall
//! outside the subset the store can address pixel by pixel.
//!
//! # Supported Subset
//!
//! - **Organization**: tiled only (no strips)
//! - **Compression**: none (tiles are addressed byte-for-byte)
//! - **Planar configuration**: chunky (all channels of a pixel together)
//! - **Bit depth**: one of 8/16/32/64, identical for every channel
//! - **Sample format**: unsigned, signed or IEEE float (tag absent = unsigned)

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::sample::{SampleFormat, SampleKind};

use super::parser::Ifd;
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

/// PlanarConfiguration value for interleaved channels.
const PLANAR_CHUNKY: u64 = 1;

/// TIFF default for an absent Compression tag (no compression).
const DEFAULT_COMPRESSION: u64 = 1;

/// TIFF default for an absent SampleFormat tag (unsigned integer).
const DEFAULT_SAMPLE_FORMAT: u64 = 1;

/// Channel count and per-sample encoding of a tiled directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub channels: usize,
    pub format: SampleFormat,
}

// =============================================================================
// Individual Checks
// =============================================================================

/// Reject striped or half-tiled directories.
pub fn check_tiled(ifd: &Ifd) -> Result<(), TiffError> {
    if ifd.is_stripped() {
        return Err(TiffError::StripOrganization);
    }
    if !ifd.has_tag(TiffTag::TileWidth) {
        return Err(TiffError::MissingTag(TiffTag::TileWidth.name()));
    }
    if !ifd.has_tag(TiffTag::TileLength) {
        return Err(TiffError::MissingTag(TiffTag::TileLength.name()));
    }
    if !ifd.has_tag(TiffTag::TileOffsets) {
        return Err(TiffError::MissingTag(TiffTag::TileOffsets.name()));
    }
    if !ifd.has_tag(TiffTag::TileByteCounts) {
        return Err(TiffError::MissingTag(TiffTag::TileByteCounts.name()));
    }
    Ok(())
}

/// Reject any compression other than "none".
pub fn check_compression<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
) -> Result<(), TiffError> {
    let code = scalar_or(ifd, values, TiffTag::Compression, DEFAULT_COMPRESSION)?;
    if code == DEFAULT_COMPRESSION {
        return Ok(());
    }

    let name = u16::try_from(code)
        .ok()
        .and_then(Compression::from_u16)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| format!("code {}", code));
    Err(TiffError::UnsupportedCompression(name))
}

/// Reject planar (separate) channel storage.
pub fn check_planar_configuration<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
) -> Result<(), TiffError> {
    let config = scalar_or(ifd, values, TiffTag::PlanarConfiguration, PLANAR_CHUNKY)?;
    if config == PLANAR_CHUNKY {
        Ok(())
    } else {
        Err(TiffError::UnsupportedPlanarConfiguration(
            u16::try_from(config).unwrap_or(u16::MAX),
        ))
    }
}

/// Resolve channel count and sample encoding.
///
/// BitsPerSample and SampleFormat may carry one value per channel or a
/// single shared value; either way all values must agree.
pub fn sample_layout<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
) -> Result<SampleLayout, TiffError> {
    let channels = scalar_or(ifd, values, TiffTag::SamplesPerPixel, 1)?;
    if channels == 0 || channels > u16::MAX as u64 {
        return Err(TiffError::InvalidTagValue {
            tag: TiffTag::SamplesPerPixel.name(),
            message: format!("{} channels", channels),
        });
    }

    let bits = uniform_value(ifd, values, TiffTag::BitsPerSample, 1)?;
    if !matches!(bits, 8 | 16 | 32 | 64) {
        return Err(TiffError::UnsupportedSampleLayout(format!(
            "{} bits per sample",
            bits
        )));
    }

    let code = uniform_value(ifd, values, TiffTag::SampleFormat, DEFAULT_SAMPLE_FORMAT)?;
    let kind = u16::try_from(code)
        .ok()
        .and_then(SampleKind::from_tiff_code)
        .ok_or_else(|| TiffError::UnsupportedSampleLayout(format!("sample format code {}", code)))?;

    Ok(SampleLayout {
        channels: channels as usize,
        format: SampleFormat::new(kind, bits as u16),
    })
}

// =============================================================================
// Combined Validation
// =============================================================================

/// Run every check and return the sample layout of a usable directory.
pub fn validate_tiled_ifd<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
) -> Result<SampleLayout, TiffError> {
    check_tiled(ifd)?;
    check_compression(ifd, values)?;
    check_planar_configuration(ifd, values)?;
    sample_layout(ifd, values)
}

// =============================================================================
// Helpers
// =============================================================================

fn scalar_or<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
    default: u64,
) -> Result<u64, TiffError> {
    match ifd.get_entry_by_tag(tag) {
        Some(entry) => values.read_u64(tag, entry),
        None => Ok(default),
    }
}

fn uniform_value<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
    default: u64,
) -> Result<u64, TiffError> {
    let Some(entry) = ifd.get_entry_by_tag(tag) else {
        return Ok(default);
    };

    let all = values.read_u64_array(tag, entry)?;
    let Some(&first) = all.first() else {
        return Ok(default);
    };
    if all.iter().any(|&v| v != first) {
        return Err(TiffError::UnsupportedSampleLayout(format!(
            "{} differs between channels: {:?}",
            tag.name(),
            all
        )));
    }
    Ok(first)
}

// =============================================================================
// Tests
// =============================================================================
