//! # Fancy Image
//!
//! Octave-indexed random access to raster images.
//!
//! An image is opened once and then sampled as `(octave, x, y, channel)`,
//! where octave `o` is the image downscaled by `2^o` with ceiling
//! rounding. Two backends hide behind the same handle:
//!
//! - **In-memory pyramid**: plain images (PNG, JPEG, TIFF, ...) are decoded
//!   whole and a box-filtered octave ladder is built eagerly.
//! - **Tiled store**: tiled, uncompressed TIFF files are read lazily
//!   through an LRU tile cache with a byte budget. Octaves are either the
//!   IFD chain of one file or one file per octave named by a `%d`
//!   template. Writes to octave 0 go back to disk.
//!
//! ## Architecture
//!
//! - [`io`] - positioned file reads and writes
//! - [`mod@format`] - TIFF parsing, octave file templates, backend selection
//! - [`tile`] - tile cache and the tiled store
//! - [`pyramid`] - in-memory octave construction
//! - [`codec`] - plain image decoding and crop encoding
//! - [`fancy`] - the [`FancyImage`] handle
//! - [`config`] - option strings and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use fancy_image::FancyImage;
//!
//! let image = FancyImage::open("photo.png", "octaves=4")?;
//! for octave in 0..image.octave_count() as isize {
//!     println!(
//!         "octave {}: {}x{}, center sample {}",
//!         octave,
//!         image.width_at_octave(octave),
//!         image.height_at_octave(octave),
//!         image.sample_at_octave(
//!             octave,
//!             image.width_at_octave(octave) as isize / 2,
//!             image.height_at_octave(octave) as isize / 2,
//!             0,
//!         ),
//!     );
//! }
//! # Ok::<(), fancy_image::FancyImageError>(())
//! ```

pub mod codec;
pub mod config;
pub mod crop;
pub mod error;
pub mod fancy;
pub mod format;
pub mod io;
pub mod pyramid;
pub mod sample;
pub mod tile;

// Re-export commonly used types
pub use codec::DecodedImage;
pub use config::{Cli, Command, CropConfig, InfoConfig, Options, OptionsBuilder, SampleConfig};
pub use crop::crop_around;
pub use error::{CodecError, FancyImageError, IoError, PyramidError, TiffError, TileStoreError};
pub use fancy::FancyImage;
pub use format::tiff::{
    is_ceil_half, read_ifd_chain, validate_tiled_ifd, ByteOrder, Ifd, IfdEntry, SampleLayout,
    TiffHeader, TiffTag, TiledLevel, MAX_IFDS,
};
pub use format::{
    has_octave_placeholder, octave_path, probe_tiled, select_backend, Backend, STDIN_IDENTIFIER,
};
pub use io::{FileRangeReader, RangeReader, RangeWriter};
pub use pyramid::Octave;
pub use sample::{to_float, SampleFormat, SampleKind};
pub use tile::{CachedTile, Pixel, TileCache, TileKey, TileStore};
