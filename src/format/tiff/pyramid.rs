//! Tiled octave levels and IFD chain walking.
//!
//! A tiled octave is one IFD that passes validation: its geometry, tile
//! grid, sample layout and the file positions of its tiles.
//!
//! # Octave Chains
//!
//! Octave `s + 1` must be exactly the ceil-half of octave `s` in both
//! dimensions. Walking stops at the first directory that breaks the chain,
//! so thumbnails, labels and masks stored after the octaves are ignored.

use std::collections::HashSet;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::sample::SampleFormat;

use super::parser::{Ifd, TiffHeader};
use super::tags::TiffTag;
use super::validation::validate_tiled_ifd;
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs walked in one file
pub const MAX_IFDS: usize = 1024;

// =============================================================================
// TiledLevel
// =============================================================================

/// One tiled octave of a TIFF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiledLevel {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_across: u32,

    /// Number of tiles in Y direction
    pub tiles_down: u32,

    /// Channels per pixel
    pub channels: usize,

    /// Encoding of each stored sample
    pub format: SampleFormat,

    /// File offset of each tile, row-major
    pub tile_offsets: Vec<u64>,

    /// Stored byte count of each tile
    pub tile_byte_counts: Vec<u64>,
}

impl TiledLevel {
    /// Validate `ifd` and load its tile tables.
    pub fn from_ifd<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);
        let layout = validate_tiled_ifd(ifd, &values)?;

        let width = required_dimension(ifd, &values, TiffTag::ImageWidth)?;
        let height = required_dimension(ifd, &values, TiffTag::ImageLength)?;
        let tile_width = required_dimension(ifd, &values, TiffTag::TileWidth)?;
        let tile_height = required_dimension(ifd, &values, TiffTag::TileLength)?;

        let tiles_across = width.div_ceil(tile_width);
        let tiles_down = height.div_ceil(tile_height);
        let tile_count = tiles_across as usize * tiles_down as usize;

        let tile_offsets = read_tile_table(ifd, &values, TiffTag::TileOffsets, tile_count)?;
        let tile_byte_counts = read_tile_table(ifd, &values, TiffTag::TileByteCounts, tile_count)?;

        let level = TiledLevel {
            width,
            height,
            tile_width,
            tile_height,
            tiles_across,
            tiles_down,
            channels: layout.channels,
            format: layout.format,
            tile_offsets,
            tile_byte_counts,
        };

        if level.tile_bytes().is_none() {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::TileWidth.name(),
                message: format!(
                    "{}x{} tiles of {} channels cannot be addressed",
                    tile_width, tile_height, layout.channels
                ),
            });
        }

        Ok(level)
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles_across as usize * self.tiles_down as usize
    }

    /// Bytes of one pixel (all channels).
    pub fn pixel_bytes(&self) -> usize {
        self.channels * self.format.bytes()
    }

    /// Bytes of one full tile, `None` on overflow.
    pub fn tile_bytes(&self) -> Option<usize> {
        (self.tile_width as usize)
            .checked_mul(self.tile_height as usize)?
            .checked_mul(self.pixel_bytes())
    }

    /// Locate pixel `(x, y)`: tile index and byte offset inside the tile.
    ///
    /// Returns `None` outside the image.
    pub fn locate(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }

        let tw = self.tile_width as usize;
        let th = self.tile_height as usize;
        let tile = (y / th) * self.tiles_across as usize + x / tw;
        let within = ((y % th) * tw + x % tw) * self.pixel_bytes();
        Some((tile, within))
    }

    /// Whether the tile has storage in the file.
    pub fn is_allocated(&self, tile: usize) -> bool {
        matches!(
            (self.tile_offsets.get(tile), self.tile_byte_counts.get(tile)),
            (Some(&offset), Some(&count)) if offset != 0 && count != 0
        )
    }

    /// Whether this level is exactly the ceil-half of `previous`.
    pub fn is_half_of(&self, previous: &TiledLevel) -> bool {
        is_ceil_half(
            (previous.width, previous.height),
            (self.width, self.height),
        )
    }
}

/// Whether `next` is `ceil(previous / 2)` in both dimensions.
pub fn is_ceil_half(previous: (u32, u32), next: (u32, u32)) -> bool {
    previous.0.div_ceil(2) == next.0 && previous.1.div_ceil(2) == next.1
}

// =============================================================================
// IFD Chain
// =============================================================================

/// Parse every IFD of the file following the next-IFD chain.
///
/// The walk stops after [`MAX_IFDS`] directories or when an offset repeats.
pub fn read_ifd_chain<R: RangeReader + ?Sized>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS && seen.insert(offset) {
        let ifd = Ifd::read(reader, header, offset)?;
        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}

// =============================================================================
// Helpers
// =============================================================================

fn required_dimension<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
) -> Result<u32, TiffError> {
    let entry = ifd
        .get_entry_by_tag(tag)
        .ok_or(TiffError::MissingTag(tag.name()))?;
    let value = values.read_u64(tag, entry)?;

    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("dimension {} is out of range", value),
        }),
    }
}

fn read_tile_table<R: RangeReader + ?Sized>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
    tile_count: usize,
) -> Result<Vec<u64>, TiffError> {
    let entry = ifd
        .get_entry_by_tag(tag)
        .ok_or(TiffError::MissingTag(tag.name()))?;
    let table = values.read_u64_array(tag, entry)?;

    if table.len() < tile_count {
        return Err(TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("{} entries for {} tiles", table.len(), tile_count),
        });
    }
    Ok(table)
}

// =============================================================================
// Tests
// =============================================================================
