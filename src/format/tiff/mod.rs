//! TIFF parser for tiled octave files.
//!
//! This module handles parsing of TIFF and BigTIFF files whose directories
//! hold uncompressed, tiled octaves.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both transparently.
//!
//! - **IFD (Image File Directory)**: Contains metadata and pointers to image data.
//!   A single-file pyramid keeps one IFD per octave, largest first.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{is_ceil_half, read_ifd_chain, TiledLevel, MAX_IFDS};
pub use tags::{Compression, FieldType, TiffTag};
pub use validation::{
    check_compression, check_planar_configuration, check_tiled, sample_layout,
    validate_tiled_ifd, SampleLayout,
};
pub use values::ValueReader;
