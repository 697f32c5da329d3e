use thiserror::Error;

/// I/O errors that can occur when reading from or writing to a byte source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The resource could not be opened
    #[error("Cannot open {path}: {message}")]
    Open { path: String, message: String },

    /// A read failed part-way
    #[error("Read error on {identifier}: {message}")]
    Read { identifier: String, message: String },

    /// A write failed part-way
    #[error("Write error on {identifier}: {message}")]
    Write { identifier: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only uncompressed tiles are supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Samples are stored in separate planes
    #[error("Unsupported planar configuration: {0} (only chunky pixels are supported)")]
    UnsupportedPlanarConfiguration(u16),

    /// Per-channel bit depths differ or are not byte aligned
    #[error("Unsupported sample layout: {0}")]
    UnsupportedSampleLayout(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised by the tiled multi-octave store
#[derive(Debug, Clone, Error)]
pub enum TileStoreError {
    /// I/O error on one of the octave files
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF structure error on one of the octave files
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// No tiled octave could be found behind the identifier
    #[error("No tiled octave found for {0}")]
    NoOctaves(String),

    /// An octave disagrees with octave 0 on channel count or sample format
    #[error("Octave {octave} is inconsistent with octave 0: {reason}")]
    InconsistentOctave { octave: usize, reason: String },

    /// A write was attempted on a store opened read-only
    #[error("Store is read-only")]
    ReadOnly,

    /// Pixel coordinates are outside octave 0
    #[error("Pixel ({x}, {y}) is outside the {width}x{height} base octave")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// The number of values written does not match the channel count
    #[error("Expected {expected} channel values, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// The tile has no storage allocated in the file
    #[error("Tile {tile} of octave {octave} has no storage in the file")]
    SparseTile { octave: usize, tile: usize },
}

/// Errors raised by the image codec collaborator
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The resource could not be read
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The resource could not be decoded as an image
    #[error("Cannot decode {path}: {message}")]
    Decode { path: String, message: String },

    /// The buffer could not be encoded
    #[error("Cannot encode {path}: {message}")]
    Encode { path: String, message: String },

    /// Buffer length disagrees with the declared geometry
    #[error("Buffer holds {actual} samples, geometry needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Channel count has no matching pixel layout
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),
}

/// Errors raised while building the in-memory octave ladder
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// An octave buffer could not be allocated
    #[error("Cannot allocate {bytes} bytes for octave {octave}")]
    Allocation { octave: usize, bytes: usize },

    /// Buffer length disagrees with the declared geometry
    #[error("Buffer holds {actual} samples, geometry needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors surfaced by opening or closing a [`crate::FancyImage`]
#[derive(Debug, Clone, Error)]
pub enum FancyImageError {
    /// Decoding the plain image failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Opening or flushing the tiled store failed
    #[error("Tile store error: {0}")]
    TileStore(#[from] TileStoreError),

    /// The in-memory pyramid could not be built
    #[error("Pyramid error: {0}")]
    Pyramid(#[from] PyramidError),
}
