//! Tiled store integration tests.
//!
//! Tests verify:
//! - Octave discovery in single-file and per-octave-file layouts
//! - Both byte orders, classic TIFF and BigTIFF
//! - Sample conversion for every supported format
//! - Write-back on flush, close, drop and eviction

use fancy_image::sample::SampleFormat;
use fancy_image::{TileStore, TileStoreError};

use super::test_utils::{
    capture_logs, is_bigtiff_magic, is_tiff_magic, ramp_ladder, ramp_level, write_octave_files,
    ByteOrderType, Level, TiffBuilder,
};

fn ladder_file(dir: &tempfile::TempDir, name: &str, builder: TiffBuilder, levels: Vec<Level>) -> String {
    levels
        .into_iter()
        .fold(builder, TiffBuilder::add_level)
        .write_to(&dir.path().join(name))
}

fn read(store: &TileStore, octave: usize, x: usize, y: usize) -> f32 {
    store
        .read_pixel(octave, x, y)
        .map_or(f32::NAN, |p| p.to_float(0))
}

// =============================================================================
// Single File Layout
// =============================================================================

#[test]
fn test_single_file_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 3, SampleFormat::U8),
    );

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 3);
    assert_eq!(store.channels(), 1);
    assert_eq!(store.format(), SampleFormat::U8);
    assert_eq!(store.octave_dims(0), Some((20, 12)));
    assert_eq!(store.octave_dims(1), Some((10, 6)));
    assert_eq!(store.octave_dims(2), Some((5, 3)));
    assert_eq!(store.octave_dims(3), None);

    assert_eq!(read(&store, 0, 3, 2), 23.0);
    // Pixel in the second row of tiles
    assert_eq!(read(&store, 0, 17, 9), 107.0);
    assert_eq!(read(&store, 1, 4, 1), 114.0);
    assert_eq!(read(&store, 2, 4, 2), 224.0);

    assert!(store.read_pixel(0, 20, 0).is_none());
    assert!(store.read_pixel(1, 0, 6).is_none());
    assert!(store.read_pixel(3, 0, 0).is_none());
}

#[test]
fn test_octave_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 3, SampleFormat::U8),
    );

    assert_eq!(TileStore::open(&path, 1.0, 2, false).unwrap().octave_count(), 2);
    // Zero still exposes the base octave
    assert_eq!(TileStore::open(&path, 1.0, 0, false).unwrap().octave_count(), 1);
}

#[test]
fn test_chain_stops_at_non_half_directory() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![
        ramp_level(20, 12, 8, SampleFormat::U8, 0.0),
        ramp_level(10, 6, 8, SampleFormat::U8, 100.0),
        // Thumbnail-like directory that breaks the ladder
        ramp_level(7, 7, 8, SampleFormat::U8, 0.0),
        ramp_level(3, 2, 8, SampleFormat::U8, 0.0),
    ];
    let path = ladder_file(&dir, "mixed.tif", TiffBuilder::new(), levels);

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 2);
}

#[test]
fn test_chain_stops_at_strip_directory() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![
        ramp_level(20, 12, 8, SampleFormat::U8, 0.0),
        ramp_level(10, 6, 8, SampleFormat::U8, 100.0).as_strips(),
    ];
    let path = ladder_file(&dir, "strips.tif", TiffBuilder::new(), levels);

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 1);
}

#[test]
fn test_strip_base_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![ramp_level(20, 12, 8, SampleFormat::U8, 0.0).as_strips()];
    let path = ladder_file(&dir, "strips.tif", TiffBuilder::new(), levels);

    let err = TileStore::open(&path, 1.0, 30, false).unwrap_err();
    assert!(matches!(err, TileStoreError::Tiff(_)));
}

#[test]
fn test_inconsistent_channels_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![
        ramp_level(16, 16, 8, SampleFormat::U8, 0.0),
        Level::new(8, 8, 8, 3, SampleFormat::U8),
    ];
    let path = ladder_file(&dir, "bad.tif", TiffBuilder::new(), levels);

    let err = TileStore::open(&path, 1.0, 30, false).unwrap_err();
    assert!(matches!(
        err,
        TileStoreError::InconsistentOctave { octave: 1, .. }
    ));
}

// =============================================================================
// Byte Orders and Formats
// =============================================================================

#[test]
fn test_big_endian_u16() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![Level::new(10, 10, 8, 1, SampleFormat::U16).filled(|x, y, _| 1000.0 + (x * y) as f64)];
    let builder = TiffBuilder::new().with_byte_order(ByteOrderType::BigEndian);
    let path = ladder_file(&dir, "be.tif", builder, levels);

    let data = std::fs::read(&path).unwrap();
    assert_eq!(&data[..2], b"MM");
    assert!(is_tiff_magic(&data));

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(read(&store, 0, 0, 0), 1000.0);
    assert_eq!(read(&store, 0, 9, 9), 1081.0);
}

#[test]
fn test_both_byte_orders_read_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let level = Level::new(12, 9, 4, 2, SampleFormat::I16).filled(|x, y, c| {
        let v = x as f64 * 7.0 - y as f64 * 300.0;
        if c == 0 { v } else { -v }
    });

    let le = ladder_file(&dir, "le.tif", TiffBuilder::new(), vec![level.clone()]);
    let be = ladder_file(
        &dir,
        "be.tif",
        TiffBuilder::new().with_byte_order(ByteOrderType::BigEndian),
        vec![level],
    );

    let le = TileStore::open(&le, 1.0, 30, false).unwrap();
    let be = TileStore::open(&be, 1.0, 30, false).unwrap();
    for y in 0..9 {
        for x in 0..12 {
            let a = le.read_pixel(0, x, y).unwrap();
            let b = be.read_pixel(0, x, y).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.to_float(0), x as f32 * 7.0 - y as f32 * 300.0);
            assert_eq!(a.to_float(1), -(x as f32 * 7.0 - y as f32 * 300.0));
        }
    }
}

#[test]
fn test_bigtiff_float_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![
        Level::new(9, 5, 4, 1, SampleFormat::F32).filled(|x, y, _| x as f64 * 0.5 - y as f64),
        Level::new(5, 3, 4, 1, SampleFormat::F32).filled(|_, _, _| -2.25),
    ];
    let path = ladder_file(&dir, "big.tif", TiffBuilder::new().with_bigtiff(true), levels);
    assert!(is_bigtiff_magic(&std::fs::read(&path).unwrap()));

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 2);
    assert_eq!(read(&store, 0, 3, 4), -2.5);
    assert_eq!(read(&store, 1, 4, 2), -2.25);
}

#[test]
fn test_big_endian_bigtiff_f64() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![Level::new(6, 6, 4, 1, SampleFormat::F64).filled(|x, y, _| x as f64 / 4.0 + y as f64)];
    let builder = TiffBuilder::new()
        .with_bigtiff(true)
        .with_byte_order(ByteOrderType::BigEndian);
    let path = ladder_file(&dir, "big_be.tif", builder, levels);

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert_eq!(read(&store, 0, 5, 5), 6.25);
}

#[test]
fn test_32_bit_integers_read_low_half() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![Level::new(4, 4, 4, 1, SampleFormat::U32).filled(|x, _, _| 70000.0 + x as f64)];
    let path = ladder_file(&dir, "u32.tif", TiffBuilder::new(), levels);

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    // 70000 = 0x11170, only 0x1170 survives
    assert_eq!(read(&store, 0, 0, 0), 4464.0);
    assert_eq!(read(&store, 0, 3, 0), 4467.0);
}

// =============================================================================
// Per-Octave Files
// =============================================================================

#[test]
fn test_template_layout() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_octave_files(
        dir.path(),
        "level_%d.tif",
        &ramp_ladder(20, 12, 8, 3, SampleFormat::U8),
    );

    let store = TileStore::open(&template, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 3);
    assert_eq!(store.octave_dims(2), Some((5, 3)));
    assert_eq!(read(&store, 1, 2, 3), 132.0);
    assert_eq!(read(&store, 2, 0, 0), 200.0);

    let store = TileStore::open(&template, 1.0, 2, false).unwrap();
    assert_eq!(store.octave_count(), 2);
}

#[test]
fn test_template_stops_at_first_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let ladder = ramp_ladder(20, 12, 8, 3, SampleFormat::U8);
    let template = write_octave_files(dir.path(), "level_%d.tif", &ladder);
    std::fs::remove_file(dir.path().join("level_1.tif")).unwrap();

    let store = TileStore::open(&template, 1.0, 30, false).unwrap();
    assert_eq!(store.octave_count(), 1);
}

#[test]
fn test_template_without_base_file() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("nothing_%d.tif");

    let err = TileStore::open(template.to_str().unwrap(), 1.0, 30, false).unwrap_err();
    assert!(matches!(err, TileStoreError::NoOctaves(_)));
}

// =============================================================================
// Sparse Tiles
// =============================================================================

#[test]
fn test_sparse_tiles_read_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let level = Level::new(16, 8, 8, 1, SampleFormat::U8)
        .filled(|_, _, _| 9.0)
        .with_sparse_tile(1);
    let path = ladder_file(&dir, "sparse.tif", TiffBuilder::new(), vec![level]);

    let mut store = TileStore::open(&path, 1.0, 30, true).unwrap();
    assert_eq!(read(&store, 0, 3, 3), 9.0);
    assert_eq!(read(&store, 0, 12, 3), 0.0);

    assert!(matches!(
        store.write_pixel(12, 3, &[1.0]),
        Err(TileStoreError::SparseTile { octave: 0, tile: 1 })
    ));
    assert!(store.write_pixel(3, 3, &[1.0]).is_ok());
    store.close().unwrap();
}

#[test]
fn test_truncated_tile_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "truncated.tif",
        TiffBuilder::new(),
        vec![ramp_level(16, 8, 8, SampleFormat::U8, 0.0)],
    );

    // The last tile ends at the end of the file
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - 1).unwrap();

    let store = TileStore::open(&path, 1.0, 30, false).unwrap();
    let (missing, logs) = capture_logs(|| {
        (0..8)
            .flat_map(|y| (8..16).map(move |x| (x, y)))
            .filter(|&(x, y)| store.read_pixel(0, x, y).is_none())
            .count()
    });

    assert_eq!(missing, 64);
    assert_eq!(logs.matches("Tile access failed").count(), 1);
    assert_eq!(read(&store, 0, 3, 2), 23.0);
}

// =============================================================================
// Writes
// =============================================================================

#[test]
fn test_write_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 2, SampleFormat::U8),
    );

    let mut read_only = TileStore::open(&path, 1.0, 30, false).unwrap();
    assert!(matches!(
        read_only.write_pixel(0, 0, &[1.0]),
        Err(TileStoreError::ReadOnly)
    ));

    let mut store = TileStore::open(&path, 1.0, 1, true).unwrap();
    assert!(store.is_writable());
    assert!(matches!(
        store.write_pixel(0, 0, &[1.0, 2.0]),
        Err(TileStoreError::ChannelMismatch {
            expected: 1,
            actual: 2
        })
    ));
    assert!(matches!(
        store.write_pixel(20, 0, &[1.0]),
        Err(TileStoreError::OutOfBounds { x: 20, .. })
    ));
    assert_eq!(store.dirty_tiles(), 0);
}

#[test]
fn test_flush_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 1, SampleFormat::U8),
    );

    let mut store = TileStore::open(&path, 1.0, 1, true).unwrap();
    store.write_pixel(3, 2, &[77.0]).unwrap();
    assert_eq!(read(&store, 0, 3, 2), 77.0);
    assert_eq!(store.dirty_tiles(), 1);

    store.flush().unwrap();
    assert_eq!(store.dirty_tiles(), 0);

    let reopened = TileStore::open(&path, 1.0, 1, false).unwrap();
    assert_eq!(read(&reopened, 0, 3, 2), 77.0);
    // Neighbors are untouched
    assert_eq!(read(&reopened, 0, 4, 2), 24.0);
    store.close().unwrap();
}

#[test]
fn test_integer_writes_round_and_saturate() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![Level::new(8, 8, 8, 3, SampleFormat::U8)];
    let path = ladder_file(&dir, "rgb.tif", TiffBuilder::new(), levels);

    let mut store = TileStore::open(&path, 1.0, 1, true).unwrap();
    store.write_pixel(5, 5, &[300.0, -5.0, 41.6]).unwrap();
    store.close().unwrap();

    let store = TileStore::open(&path, 1.0, 1, false).unwrap();
    let pixel = store.read_pixel(0, 5, 5).unwrap();
    assert_eq!(pixel.channels(), 3);
    assert_eq!(pixel.to_float(0), 255.0);
    assert_eq!(pixel.to_float(1), 0.0);
    assert_eq!(pixel.to_float(2), 42.0);
}

#[test]
fn test_big_endian_write_back() {
    let dir = tempfile::tempdir().unwrap();
    let levels = vec![Level::new(8, 8, 8, 1, SampleFormat::U16)];
    let builder = TiffBuilder::new().with_byte_order(ByteOrderType::BigEndian);
    let path = ladder_file(&dir, "be.tif", builder, levels);

    let mut store = TileStore::open(&path, 1.0, 1, true).unwrap();
    store.write_pixel(0, 0, &[513.0]).unwrap();
    store.close().unwrap();

    let store = TileStore::open(&path, 1.0, 1, false).unwrap();
    assert_eq!(read(&store, 0, 0, 0), 513.0);

    // 513 = 0x0201, stored big-endian somewhere in the file
    let data = std::fs::read(&path).unwrap();
    assert!(data.windows(2).any(|w| w == [0x02, 0x01]));
}

#[test]
fn test_drop_writes_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 1, SampleFormat::U8),
    );

    {
        let mut store = TileStore::open(&path, 1.0, 1, true).unwrap();
        store.write_pixel(19, 11, &[5.0]).unwrap();
    }

    let store = TileStore::open(&path, 1.0, 1, false).unwrap();
    assert_eq!(read(&store, 0, 19, 11), 5.0);
}

#[test]
fn test_eviction_writes_back_dirty_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = ladder_file(
        &dir,
        "ladder.tif",
        TiffBuilder::new(),
        ramp_ladder(20, 12, 8, 1, SampleFormat::U8),
    );

    // A zero budget still holds the largest tile
    let mut store = TileStore::open(&path, 0.0, 1, true).unwrap();
    store.write_pixel(1, 1, &[50.0]).unwrap();
    assert_eq!(store.cached_tiles(), 1);
    assert_eq!(store.dirty_tiles(), 1);

    // Loading tile 1 evicts the modified tile 0
    assert_eq!(read(&store, 0, 10, 1), 20.0);
    assert_eq!(store.cached_tiles(), 1);
    assert_eq!(store.dirty_tiles(), 0);

    let other = TileStore::open(&path, 1.0, 1, false).unwrap();
    assert_eq!(read(&other, 0, 1, 1), 50.0);

    // Reloading tile 0 sees the written value
    assert_eq!(read(&store, 0, 1, 1), 50.0);
    store.close().unwrap();
}

#[test]
fn test_template_writes_go_to_base_file() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_octave_files(
        dir.path(),
        "level_%d.tif",
        &ramp_ladder(20, 12, 8, 3, SampleFormat::U8),
    );

    // The store does not apply the single-octave write rule itself
    let mut store = TileStore::open(&template, 1.0, 30, true).unwrap();
    assert_eq!(store.octave_count(), 3);
    store.write_pixel(0, 0, &[99.0]).unwrap();
    store.close().unwrap();

    let base = TileStore::open(dir.path().join("level_0.tif").to_str().unwrap(), 1.0, 1, false).unwrap();
    assert_eq!(read(&base, 0, 0, 0), 99.0);
    let level1 = TileStore::open(dir.path().join("level_1.tif").to_str().unwrap(), 1.0, 1, false).unwrap();
    assert_eq!(read(&level1, 0, 0, 0), 100.0);
}
