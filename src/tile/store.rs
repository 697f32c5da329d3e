//! Tiled multi-octave store.
//!
//! Opens a pre-tiled pyramid and serves single pixels from it, loading
//! whole tiles on demand into a byte-budgeted LRU cache.
//!
//! # Layouts
//!
//! - **Template**: the identifier contains an octave placeholder
//!   (`slide_%d.tif`). Octave `o` is the first directory of
//!   `octave_path(identifier, o)`. Probing stops at the first missing file,
//!   at the octave ceiling, or when a file breaks the ceil-half chain.
//! - **Single file**: successive tiled directories of one file are
//!   octaves as long as each is the ceil-half of the previous one.
//!
//! # Byte Order
//!
//! Cached tiles always hold little-endian samples. Big-endian files are
//! swapped on load and swapped back on write-back.
//!
//! # Writes
//!
//! Only octave 0 is writable. Modified tiles are written back in place when
//! they are evicted, on [`TileStore::flush`], on [`TileStore::close`], and
//! as a last resort when the store is dropped.

use std::cell::RefCell;
use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{IoError, TiffError, TileStoreError};
use crate::format::tiff::{read_ifd_chain, ByteOrder, Ifd, TiffHeader, TiledLevel};
use crate::format::{has_octave_placeholder, octave_path};
use crate::io::{FileRangeReader, RangeReader, RangeWriter};
use crate::sample::SampleFormat;

use super::cache::{CachedTile, TileCache, TileKey};

// =============================================================================
// Pixel
// =============================================================================

/// The raw samples of one pixel and their encoding.
///
/// `bytes` holds `channels × format.bytes()` little-endian bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Pixel {
    pub bytes: Vec<u8>,
    pub format: SampleFormat,
}

impl Pixel {
    /// Number of channels in the pixel.
    pub fn channels(&self) -> usize {
        match self.format.bytes() {
            0 => 0,
            n => self.bytes.len() / n,
        }
    }

    /// Raw bytes of one channel, `None` past the last channel.
    pub fn sample(&self, channel: usize) -> Option<&[u8]> {
        let n = self.format.bytes();
        self.bytes.get(channel * n..(channel + 1) * n)
    }

    /// One channel converted to `f32`; NaN past the last channel.
    pub fn to_float(&self, channel: usize) -> f32 {
        self.sample(channel)
            .map_or(f32::NAN, |raw| self.format.to_float(raw))
    }
}

// =============================================================================
// Octave
// =============================================================================

/// One octave and where it lives.
#[derive(Debug)]
struct Octave {
    level: TiledLevel,

    /// Index into `TileStore::files`
    file: usize,

    byte_order: ByteOrder,
}

// =============================================================================
// TileStore
// =============================================================================

/// A tiled, multi-octave image on disk.
pub struct TileStore {
    identifier: String,
    files: Vec<FileRangeReader>,
    octaves: Vec<Octave>,
    channels: usize,
    format: SampleFormat,
    writable: bool,
    closed: bool,
    cache: RefCell<TileCache>,

    /// Tiles whose load failure has already been reported
    failed_tiles: RefCell<HashSet<TileKey>>,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("identifier", &self.identifier)
            .field("octaves", &self.octaves.len())
            .field("channels", &self.channels)
            .field("format", &self.format)
            .field("writable", &self.writable)
            .finish()
    }
}

impl TileStore {
    /// Open the tiled pyramid behind `path`.
    ///
    /// `megabytes` bounds the tile cache, `max_octaves` bounds the number
    /// of octaves exposed (at least one). With `writable`, octave 0 is
    /// opened for in-place writes.
    pub fn open(
        path: &str,
        megabytes: f64,
        max_octaves: usize,
        writable: bool,
    ) -> Result<Self, TileStoreError> {
        let max_octaves = max_octaves.max(1);

        let (files, octaves) = if has_octave_placeholder(path) {
            open_template(path, max_octaves, writable)?
        } else {
            open_single(path, max_octaves, writable)?
        };

        let base = octaves
            .first()
            .ok_or_else(|| TileStoreError::NoOctaves(path.to_string()))?;
        let channels = base.level.channels;
        let format = base.level.format;

        let largest_tile = octaves
            .iter()
            .filter_map(|o| o.level.tile_bytes())
            .max()
            .unwrap_or(0);
        let budget = ((megabytes.max(0.0) * 1024.0 * 1024.0) as usize).max(largest_tile);

        for (index, octave) in octaves.iter().enumerate() {
            debug!(
                identifier = path,
                octave = index,
                width = octave.level.width,
                height = octave.level.height,
                tile_width = octave.level.tile_width,
                tile_height = octave.level.tile_height,
                "Opened tiled octave"
            );
        }
        debug!(
            identifier = path,
            octaves = octaves.len(),
            channels,
            format = %format,
            cache_bytes = budget,
            "Opened tile store"
        );

        Ok(TileStore {
            identifier: path.to_string(),
            files,
            octaves,
            channels,
            format,
            writable,
            closed: false,
            cache: RefCell::new(TileCache::with_capacity(budget)),
            failed_tiles: RefCell::new(HashSet::new()),
        })
    }

    /// Identifier the store was opened with.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of octaves.
    pub fn octave_count(&self) -> usize {
        self.octaves.len()
    }

    /// Width and height of an octave.
    pub fn octave_dims(&self, octave: usize) -> Option<(usize, usize)> {
        self.octaves
            .get(octave)
            .map(|o| (o.level.width as usize, o.level.height as usize))
    }

    /// Channels per pixel, identical in every octave.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sample encoding, identical in every octave.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Whether octave 0 accepts writes.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Number of tiles currently held in memory.
    pub fn cached_tiles(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Number of modified tiles not yet written back.
    pub fn dirty_tiles(&self) -> usize {
        self.cache.borrow().dirty_count()
    }

    /// Read the raw samples of pixel `(x, y)` at `octave`.
    ///
    /// Returns `None` outside the octave grid or when the tile cannot be
    /// read. The first failure of each tile is logged as a warning.
    pub fn read_pixel(&self, octave: usize, x: usize, y: usize) -> Option<Pixel> {
        let level = &self.octaves.get(octave)?.level;
        let (tile, within) = level.locate(x, y)?;
        let key = TileKey::new(octave, tile);

        // A failed write-back of an evicted tile still leaves this tile cached
        if let Err(e) = self.ensure_loaded(key) {
            if self.failed_tiles.borrow_mut().insert(key) {
                warn!(identifier = %self.identifier, octave, tile, error = %e, "Tile access failed");
            } else {
                debug!(identifier = %self.identifier, octave, tile, error = %e, "Tile access failed again");
            }
        }

        let mut cache = self.cache.borrow_mut();
        let cached = cache.get(&key)?;
        let bytes = cached.data.get(within..within + level.pixel_bytes())?.to_vec();
        Some(Pixel {
            bytes,
            format: self.format,
        })
    }

    /// Overwrite pixel `(x, y)` of octave 0 with one value per channel.
    ///
    /// Values are encoded in the stored format (rounded and saturated for
    /// integers). The tile is written back later.
    pub fn write_pixel(&mut self, x: usize, y: usize, values: &[f32]) -> Result<(), TileStoreError> {
        if !self.writable {
            return Err(TileStoreError::ReadOnly);
        }
        if values.len() != self.channels {
            return Err(TileStoreError::ChannelMismatch {
                expected: self.channels,
                actual: values.len(),
            });
        }

        let base = &self.octaves[0].level;
        let (tile, within) = base.locate(x, y).ok_or(TileStoreError::OutOfBounds {
            x,
            y,
            width: base.width as usize,
            height: base.height as usize,
        })?;
        if !base.is_allocated(tile) {
            return Err(TileStoreError::SparseTile { octave: 0, tile });
        }

        let key = TileKey::new(0, tile);
        self.ensure_loaded(key)?;

        let sample_bytes = self.format.bytes();
        let mut cache = self.cache.borrow_mut();
        let cached = cache.get_mut(&key).ok_or(TileStoreError::SparseTile { octave: 0, tile })?;

        for (channel, &value) in values.iter().enumerate() {
            let start = within + channel * sample_bytes;
            let Some(out) = cached.data.get_mut(start..start + sample_bytes) else {
                return Err(TileStoreError::OutOfBounds {
                    x,
                    y,
                    width: base.width as usize,
                    height: base.height as usize,
                });
            };
            if !self.format.write_float(value, out) {
                return Err(TileStoreError::Tiff(TiffError::UnsupportedSampleLayout(
                    format!("cannot encode {} samples", self.format),
                )));
            }
        }
        cached.dirty = true;
        Ok(())
    }

    /// Write every modified tile back to its file.
    ///
    /// All tiles are attempted; the first failure is returned.
    pub fn flush(&mut self) -> Result<(), TileStoreError> {
        let mut cache = self.cache.borrow_mut();
        let mut first_error = None;
        let mut written = 0usize;

        for (key, tile) in cache.dirty_tiles_mut() {
            match self.write_tile(*key, &tile.data) {
                Ok(()) => {
                    tile.dirty = false;
                    written += 1;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if written > 0 {
            debug!(identifier = %self.identifier, tiles = written, "Flushed modified tiles");
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush and release the store.
    pub fn close(mut self) -> Result<(), TileStoreError> {
        let result = self.flush();
        self.closed = true;
        result
    }

    // -------------------------------------------------------------------------
    // Tile I/O
    // -------------------------------------------------------------------------

    /// Make sure `key` is cached, writing back anything evicted to make room.
    fn ensure_loaded(&self, key: TileKey) -> Result<(), TileStoreError> {
        if self.cache.borrow().contains(&key) {
            return Ok(());
        }

        let data = self.load_tile(key)?;
        let evicted = self.cache.borrow_mut().put(key, CachedTile::clean(data));

        let mut result = Ok(());
        for (evicted_key, tile) in evicted {
            if let Err(e) = self.write_tile(evicted_key, &tile.data) {
                warn!(
                    identifier = %self.identifier,
                    octave = evicted_key.octave,
                    tile = evicted_key.tile,
                    error = %e,
                    "Failed to write back evicted tile"
                );
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Read one tile, normalized to little-endian samples.
    ///
    /// Unallocated tiles read as zeros; short tiles are zero-padded.
    fn load_tile(&self, key: TileKey) -> Result<Vec<u8>, TileStoreError> {
        let octave = &self.octaves[key.octave];
        let level = &octave.level;
        let tile_bytes = level.tile_bytes().unwrap_or(0);
        let mut data = vec![0u8; tile_bytes];

        if !level.is_allocated(key.tile) {
            return Ok(data);
        }

        let offset = level.tile_offsets[key.tile];
        let stored = usize::try_from(level.tile_byte_counts[key.tile])
            .unwrap_or(usize::MAX)
            .min(tile_bytes);

        let bytes = self.files[octave.file].read_exact_at(offset, stored)?;
        data[..stored].copy_from_slice(&bytes);

        if octave.byte_order.differs_from_little_endian() {
            swap_samples(&mut data, self.format.bytes());
        }
        Ok(data)
    }

    /// Write one tile back in place, in the file's byte order.
    fn write_tile(&self, key: TileKey, data: &[u8]) -> Result<(), TileStoreError> {
        let octave = &self.octaves[key.octave];
        let level = &octave.level;
        if !level.is_allocated(key.tile) {
            return Err(TileStoreError::SparseTile {
                octave: key.octave,
                tile: key.tile,
            });
        }

        let offset = level.tile_offsets[key.tile];
        let stored = usize::try_from(level.tile_byte_counts[key.tile])
            .unwrap_or(usize::MAX)
            .min(data.len());

        let file = &self.files[octave.file];
        if octave.byte_order.differs_from_little_endian() {
            let mut swapped = data[..stored].to_vec();
            swap_samples(&mut swapped, self.format.bytes());
            file.write_all_at(offset, &swapped)?;
        } else {
            file.write_all_at(offset, &data[..stored])?;
        }
        Ok(())
    }
}

impl Drop for TileStore {
    fn drop(&mut self) {
        if self.closed || !self.writable {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(identifier = %self.identifier, error = %e, "Failed to write back tiles on drop");
        }
    }
}

// =============================================================================
// Layout Discovery
// =============================================================================

type Opened = (Vec<FileRangeReader>, Vec<Octave>);

fn open_file(path: &str, writable: bool) -> Result<FileRangeReader, IoError> {
    if writable {
        FileRangeReader::open_writable(path)
    } else {
        FileRangeReader::open(path)
    }
}

/// One file per octave, named by the template.
fn open_template(template: &str, max_octaves: usize, writable: bool) -> Result<Opened, TileStoreError> {
    let mut files = Vec::new();
    let mut octaves: Vec<Octave> = Vec::new();

    for index in 0..max_octaves {
        let path = octave_path(template, index);

        // Only octave 0 is ever written
        let file = match open_file(&path, writable && index == 0) {
            Ok(file) => file,
            Err(IoError::NotFound(_)) if index > 0 => break,
            Err(IoError::NotFound(_)) => return Err(TileStoreError::NoOctaves(template.to_string())),
            Err(e) => return Err(e.into()),
        };

        let header = TiffHeader::read(&file)?;
        let ifd = Ifd::read(&file, &header, header.first_ifd_offset)?;
        let level = TiledLevel::from_ifd(&file, &header, &ifd)?;

        if let Some(previous) = octaves.last() {
            if !level.is_half_of(&previous.level) {
                debug!(path = %path, "Octave file breaks the half-size chain, stopping");
                break;
            }
            check_consistent(index, &octaves[0].level, &level)?;
        }

        octaves.push(Octave {
            level,
            file: files.len(),
            byte_order: header.byte_order,
        });
        files.push(file);
    }

    Ok((files, octaves))
}

/// Successive tiled directories of one file.
fn open_single(path: &str, max_octaves: usize, writable: bool) -> Result<Opened, TileStoreError> {
    let file = open_file(path, writable)?;
    let header = TiffHeader::read(&file)?;
    let ifds = read_ifd_chain(&file, &header)?;

    let mut octaves: Vec<Octave> = Vec::new();
    for ifd in &ifds {
        if octaves.len() == max_octaves {
            break;
        }

        if let Some(previous) = octaves.last() {
            if !ifd.is_tiled() {
                break;
            }
            let level = TiledLevel::from_ifd(&file, &header, ifd)?;
            if !level.is_half_of(&previous.level) {
                break;
            }
            check_consistent(octaves.len(), &octaves[0].level, &level)?;
            octaves.push(Octave {
                level,
                file: 0,
                byte_order: header.byte_order,
            });
        } else {
            let level = TiledLevel::from_ifd(&file, &header, ifd)?;
            octaves.push(Octave {
                level,
                file: 0,
                byte_order: header.byte_order,
            });
        }
    }

    Ok((vec![file], octaves))
}

fn check_consistent(octave: usize, base: &TiledLevel, level: &TiledLevel) -> Result<(), TileStoreError> {
    if level.channels != base.channels {
        return Err(TileStoreError::InconsistentOctave {
            octave,
            reason: format!("{} channels, expected {}", level.channels, base.channels),
        });
    }
    if level.format != base.format {
        return Err(TileStoreError::InconsistentOctave {
            octave,
            reason: format!("{} samples, expected {}", level.format, base.format),
        });
    }
    Ok(())
}

/// Reverse the bytes of every sample in place.
fn swap_samples(data: &mut [u8], sample_bytes: usize) {
    if sample_bytes > 1 {
        for sample in data.chunks_exact_mut(sample_bytes) {
            sample.reverse();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
