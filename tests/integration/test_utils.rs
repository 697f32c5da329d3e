//! Test utilities for integration tests.
//!
//! Builders for small uncompressed tiled TIFF files in every layout the
//! store understands (classic or BigTIFF, either byte order, several
//! directories, sparse tiles), plus helpers for plain PNG inputs.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{ImageBuffer, Luma, Rgb};

use fancy_image::sample::{SampleFormat, SampleKind};

// =============================================================================
// Byte Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

impl ByteOrderType {
    /// Store the low `size` bytes of `value` at `offset`.
    fn put(self, data: &mut [u8], offset: usize, value: u64, size: usize) {
        let bytes = value.to_le_bytes();
        for (i, &byte) in bytes.iter().take(size).enumerate() {
            let pos = match self {
                ByteOrderType::LittleEndian => offset + i,
                ByteOrderType::BigEndian => offset + size - 1 - i,
            };
            data[pos] = byte;
        }
    }
}

// =============================================================================
// Level Description
// =============================================================================

/// One directory of a test TIFF: geometry, sample encoding and contents.
#[derive(Debug, Clone)]
pub struct Level {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub channels: u16,
    pub format: SampleFormat,
    /// Row-major, interleaved sample values
    pub samples: Vec<f64>,
    pub sparse_tiles: Vec<usize>,
    pub tiled: bool,
}

impl Level {
    /// An all-zero tiled level with square tiles.
    pub fn new(width: u32, height: u32, tile: u32, channels: u16, format: SampleFormat) -> Self {
        Self {
            width,
            height,
            tile_width: tile,
            tile_height: tile,
            channels,
            format,
            samples: vec![0.0; width as usize * height as usize * channels as usize],
            sparse_tiles: Vec::new(),
            tiled: true,
        }
    }

    /// Fill every sample from `(x, y, channel)`.
    pub fn filled(mut self, f: impl Fn(u32, u32, u16) -> f64) -> Self {
        for y in 0..self.height {
            for x in 0..self.width {
                for c in 0..self.channels {
                    let index = self.index(x, y, c);
                    self.samples[index] = f(x, y, c);
                }
            }
        }
        self
    }

    /// Leave tile `index` without storage in the file.
    pub fn with_sparse_tile(mut self, index: usize) -> Self {
        self.sparse_tiles.push(index);
        self
    }

    /// Store the level as a single strip instead of tiles.
    pub fn as_strips(mut self) -> Self {
        self.tiled = false;
        self
    }

    fn index(&self, x: u32, y: u32, c: u16) -> usize {
        ((y as usize * self.width as usize) + x as usize) * self.channels as usize + c as usize
    }

    fn sample_bytes(&self) -> usize {
        self.format.bytes()
    }

    fn encode_pixel(&self, x: u32, y: u32, order: ByteOrderType, out: &mut [u8]) {
        let size = self.sample_bytes();
        for c in 0..self.channels {
            let value = self.samples[self.index(x, y, c)];
            let raw = raw_sample(self.format, value);
            order.put(out, c as usize * size, raw, size);
        }
    }

    /// Encoded chunks (tiles or the single strip); `None` for sparse tiles.
    fn chunks(&self, order: ByteOrderType) -> Vec<Option<Vec<u8>>> {
        let pixel_bytes = self.channels as usize * self.sample_bytes();

        if !self.tiled {
            let mut strip = vec![0u8; self.width as usize * self.height as usize * pixel_bytes];
            for y in 0..self.height {
                for x in 0..self.width {
                    let at = (y as usize * self.width as usize + x as usize) * pixel_bytes;
                    self.encode_pixel(x, y, order, &mut strip[at..at + pixel_bytes]);
                }
            }
            return vec![Some(strip)];
        }

        let across = self.width.div_ceil(self.tile_width);
        let down = self.height.div_ceil(self.tile_height);
        let tile_bytes = self.tile_width as usize * self.tile_height as usize * pixel_bytes;

        let mut chunks = Vec::new();
        for ty in 0..down {
            for tx in 0..across {
                let index = (ty * across + tx) as usize;
                if self.sparse_tiles.contains(&index) {
                    chunks.push(None);
                    continue;
                }

                let mut tile = vec![0u8; tile_bytes];
                for j in 0..self.tile_height {
                    for i in 0..self.tile_width {
                        let (x, y) = (tx * self.tile_width + i, ty * self.tile_height + j);
                        if x >= self.width || y >= self.height {
                            continue;
                        }
                        let at = (j as usize * self.tile_width as usize + i as usize) * pixel_bytes;
                        self.encode_pixel(x, y, order, &mut tile[at..at + pixel_bytes]);
                    }
                }
                chunks.push(Some(tile));
            }
        }
        chunks
    }

    /// Directory entries sorted by tag; chunk tables are filled in later.
    fn entries(&self, chunk_count: usize, bigtiff: bool) -> Vec<Entry> {
        let offset_type = if bigtiff { LONG8 } else { LONG };
        let channels = self.channels as usize;
        let sample_format = match self.format.kind {
            SampleKind::Unsigned => 1,
            SampleKind::Signed => 2,
            SampleKind::Float => 3,
        };

        let mut entries = vec![
            Entry::new(256, LONG, vec![self.width as u64]),
            Entry::new(257, LONG, vec![self.height as u64]),
            Entry::new(258, SHORT, vec![self.format.bits as u64; channels]),
            Entry::new(259, SHORT, vec![1]),
            Entry::new(262, SHORT, vec![1]),
        ];

        if self.tiled {
            entries.push(Entry::new(277, SHORT, vec![channels as u64]));
            entries.push(Entry::new(284, SHORT, vec![1]));
            entries.push(Entry::new(322, LONG, vec![self.tile_width as u64]));
            entries.push(Entry::new(323, LONG, vec![self.tile_height as u64]));
            entries.push(Entry::new(TILE_OFFSETS, offset_type, vec![0; chunk_count]));
            entries.push(Entry::new(TILE_BYTE_COUNTS, offset_type, vec![0; chunk_count]));
        } else {
            entries.push(Entry::new(STRIP_OFFSETS, offset_type, vec![0; chunk_count]));
            entries.push(Entry::new(277, SHORT, vec![channels as u64]));
            entries.push(Entry::new(278, LONG, vec![self.height as u64]));
            entries.push(Entry::new(STRIP_BYTE_COUNTS, offset_type, vec![0; chunk_count]));
            entries.push(Entry::new(284, SHORT, vec![1]));
        }

        entries.push(Entry::new(339, SHORT, vec![sample_format; channels]));
        entries
    }
}

/// Raw bit pattern of `value` in `format`, before byte ordering.
fn raw_sample(format: SampleFormat, value: f64) -> u64 {
    match (format.kind, format.bits) {
        (SampleKind::Unsigned, 8) => value as u8 as u64,
        (SampleKind::Unsigned, 16) => value as u16 as u64,
        (SampleKind::Unsigned, 32) => value as u32 as u64,
        (SampleKind::Signed, 8) => value as i8 as u8 as u64,
        (SampleKind::Signed, 16) => value as i16 as u16 as u64,
        (SampleKind::Signed, 32) => value as i32 as u32 as u64,
        (SampleKind::Float, 32) => (value as f32).to_bits() as u64,
        (SampleKind::Float, 64) => value.to_bits(),
        (kind, bits) => panic!("no test encoding for {:?}{}", kind, bits),
    }
}

// =============================================================================
// TIFF Builder
// =============================================================================

const SHORT: u16 = 3;
const LONG: u16 = 4;
const LONG8: u16 = 16;

const STRIP_OFFSETS: u16 = 273;
const STRIP_BYTE_COUNTS: u16 = 279;
const TILE_OFFSETS: u16 = 324;
const TILE_BYTE_COUNTS: u16 = 325;

#[derive(Debug, Clone)]
struct Entry {
    tag: u16,
    field_type: u16,
    values: Vec<u64>,
}

impl Entry {
    fn new(tag: u16, field_type: u16, values: Vec<u64>) -> Self {
        Self {
            tag,
            field_type,
            values,
        }
    }

    fn value_size(&self) -> usize {
        let width = match self.field_type {
            SHORT => 2,
            LONG => 4,
            _ => 8,
        };
        width * self.values.len()
    }
}

struct PlannedIfd {
    offset: usize,
    entries: Vec<Entry>,
    external: Vec<Option<usize>>,
    chunks: Vec<(usize, Vec<u8>)>,
}

/// Builder for multi-directory tiled TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    bigtiff: bool,
    levels: Vec<Level>,
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            bigtiff: false,
            levels: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, bigtiff: bool) -> Self {
        self.bigtiff = bigtiff;
        self
    }

    pub fn add_level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    /// Build the TIFF file data.
    pub fn build(&self) -> Vec<u8> {
        let (header_size, count_size, entry_size, next_size, inline_size) = if self.bigtiff {
            (16, 8, 20, 8, 8)
        } else {
            (8, 2, 12, 4, 4)
        };

        // Pass 1: place every directory, external value and chunk
        let mut cursor = header_size;
        let mut planned = Vec::new();

        for level in &self.levels {
            let raw_chunks = level.chunks(self.byte_order);
            let mut entries = level.entries(raw_chunks.len(), self.bigtiff);

            let offset = cursor;
            cursor += count_size + entries.len() * entry_size + next_size;

            let mut external = Vec::new();
            for entry in &entries {
                let size = entry.value_size();
                if size > inline_size {
                    external.push(Some(cursor));
                    cursor += size + size % 2;
                } else {
                    external.push(None);
                }
            }

            let mut chunk_offsets = Vec::new();
            let mut chunk_counts = Vec::new();
            let mut chunks = Vec::new();
            for chunk in raw_chunks {
                match chunk {
                    Some(bytes) => {
                        chunk_offsets.push(cursor as u64);
                        chunk_counts.push(bytes.len() as u64);
                        chunks.push((cursor, bytes.clone()));
                        cursor += bytes.len();
                    }
                    None => {
                        chunk_offsets.push(0);
                        chunk_counts.push(0);
                    }
                }
            }

            for entry in &mut entries {
                match entry.tag {
                    TILE_OFFSETS | STRIP_OFFSETS => entry.values = chunk_offsets.clone(),
                    TILE_BYTE_COUNTS | STRIP_BYTE_COUNTS => entry.values = chunk_counts.clone(),
                    _ => {}
                }
            }

            planned.push(PlannedIfd {
                offset,
                entries,
                external,
                chunks,
            });
        }

        // Pass 2: write
        let order = self.byte_order;
        let mut data = vec![0u8; cursor];

        let magic = match order {
            ByteOrderType::LittleEndian => b"II",
            ByteOrderType::BigEndian => b"MM",
        };
        data[..2].copy_from_slice(magic);

        let first_ifd = planned.first().map_or(0, |p| p.offset as u64);
        if self.bigtiff {
            order.put(&mut data, 2, 43, 2);
            order.put(&mut data, 4, 8, 2);
            order.put(&mut data, 6, 0, 2);
            order.put(&mut data, 8, first_ifd, 8);
        } else {
            order.put(&mut data, 2, 42, 2);
            order.put(&mut data, 4, first_ifd, 4);
        }

        for (index, ifd) in planned.iter().enumerate() {
            let mut pos = ifd.offset;
            order.put(&mut data, pos, ifd.entries.len() as u64, count_size);
            pos += count_size;

            for (entry, external) in ifd.entries.iter().zip(&ifd.external) {
                order.put(&mut data, pos, entry.tag as u64, 2);
                order.put(&mut data, pos + 2, entry.field_type as u64, 2);
                let count_width = if self.bigtiff { 8 } else { 4 };
                order.put(&mut data, pos + 4, entry.values.len() as u64, count_width);

                let value_field = pos + 4 + count_width;
                let width = entry.value_size() / entry.values.len().max(1);
                let target = match external {
                    Some(at) => {
                        order.put(&mut data, value_field, *at as u64, inline_size);
                        *at
                    }
                    None => value_field,
                };
                for (k, &value) in entry.values.iter().enumerate() {
                    order.put(&mut data, target + k * width, value, width);
                }
                pos += entry_size;
            }

            let next = planned.get(index + 1).map_or(0, |p| p.offset as u64);
            order.put(&mut data, pos, next, next_size);

            for (at, bytes) in &ifd.chunks {
                data[*at..*at + bytes.len()].copy_from_slice(bytes);
            }
        }

        data
    }

    /// Build and write the file, returning its path as a string.
    pub fn write_to(&self, path: &Path) -> String {
        std::fs::write(path, self.build()).unwrap();
        path_string(path)
    }
}

// =============================================================================
// Pyramid Helpers
// =============================================================================

/// A single-channel level whose sample at `(x, y)` is `x + 10 * y + base`.
pub fn ramp_level(width: u32, height: u32, tile: u32, format: SampleFormat, base: f64) -> Level {
    Level::new(width, height, tile, 1, format).filled(|x, y, _| x as f64 + 10.0 * y as f64 + base)
}

/// Ceil-half ladder of ramp levels starting at `width × height`.
pub fn ramp_ladder(width: u32, height: u32, tile: u32, count: usize, format: SampleFormat) -> Vec<Level> {
    let (mut w, mut h) = (width, height);
    let mut levels = Vec::new();
    for octave in 0..count {
        levels.push(ramp_level(w, h, tile, format, 100.0 * octave as f64));
        w = w.div_ceil(2);
        h = h.div_ceil(2);
    }
    levels
}

/// Write one file per level, named by `template` with `%d`.
pub fn write_octave_files(dir: &Path, template: &str, levels: &[Level]) -> String {
    for (octave, level) in levels.iter().enumerate() {
        let name = template.replace("%d", &octave.to_string());
        TiffBuilder::new().add_level(level.clone()).write_to(&dir.join(name));
    }
    path_string(&dir.join(template))
}

// =============================================================================
// Plain Image Helpers
// =============================================================================

/// Write an 8-bit grayscale PNG whose pixel `(x, y)` is `f(x, y)`.
pub fn write_gray_png(path: &Path, width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> String {
    ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)]))
        .save(path)
        .unwrap();
    path_string(path)
}

/// Write an 8-bit RGB PNG whose pixel `(x, y)` is `f(x, y)`.
pub fn write_rgb_png(path: &Path, width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> String {
    ImageBuffer::from_fn(width, height, |x, y| Rgb(f(x, y)))
        .save(path)
        .unwrap();
    path_string(path)
}

pub fn path_string(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if data starts with TIFF magic bytes.
pub fn is_tiff_magic(data: &[u8]) -> bool {
    data.len() >= 4
        && ((data[0] == b'I' && data[1] == b'I' && data[2] == 42 && data[3] == 0)
            || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 42))
}

/// Check if data starts with BigTIFF magic bytes.
pub fn is_bigtiff_magic(data: &[u8]) -> bool {
    data.len() >= 4
        && ((data[0] == b'I' && data[1] == b'I' && data[2] == 43 && data[3] == 0)
            || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 43))
}

// =============================================================================
// Log Capture
// =============================================================================

/// Shared sink for formatted log lines.
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged at
/// `info` level and above, without colors.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || LogBuffer(Arc::clone(&sink)))
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    (result, logs)
}
