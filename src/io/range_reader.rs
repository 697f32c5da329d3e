use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a resource.
///
/// The TIFF parser and the tile store only ever ask for explicit ranges,
/// so a resource never has to be loaded whole. Calls block until the
/// bytes are available.
pub trait RangeReader {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging).
    fn identifier(&self) -> &str;
}

/// A [`RangeReader`] that can also overwrite byte ranges in place.
pub trait RangeWriter: RangeReader {
    /// Overwrite `bytes.len()` bytes starting at `offset`.
    ///
    /// Writes never extend the resource.
    fn write_all_at(&self, offset: u64, bytes: &[u8]) -> Result<(), IoError>;
}

// =============================================================================
// FileRangeReader
// =============================================================================

/// Range access to a local file.
///
/// Reads and writes go through `&File`, so a shared reference is enough.
/// The handle is not meant to be shared between threads.
#[derive(Debug)]
pub struct FileRangeReader {
    file: File,
    size: u64,
    identifier: String,
    writable: bool,
}

impl FileRangeReader {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        Self::open_with_mode(path, false)
    }

    /// Open a file for reading and in-place writing.
    pub fn open_writable(path: impl AsRef<Path>) -> Result<Self, IoError> {
        Self::open_with_mode(path, true)
    }

    fn open_with_mode(path: impl AsRef<Path>, writable: bool) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => IoError::NotFound(identifier.clone()),
                _ => IoError::Open {
                    path: identifier.clone(),
                    message: e.to_string(),
                },
            })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::Open {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Self {
            file,
            size,
            identifier,
            writable,
        })
    }

    /// Whether the file was opened for writing.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<(), IoError> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            }),
        }
    }

    fn read_error(&self, e: std::io::Error) -> IoError {
        IoError::Read {
            identifier: self.identifier.clone(),
            message: e.to_string(),
        }
    }

    fn write_error(&self, e: std::io::Error) -> IoError {
        IoError::Write {
            identifier: self.identifier.clone(),
            message: e.to_string(),
        }
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.check_range(offset, len)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.read_error(e))?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(|e| self.read_error(e))?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl RangeWriter for FileRangeReader {
    fn write_all_at(&self, offset: u64, bytes: &[u8]) -> Result<(), IoError> {
        if !self.writable {
            return Err(IoError::Write {
                identifier: self.identifier.clone(),
                message: "file was opened read-only".to_string(),
            });
        }
        self.check_range(offset, bytes.len())?;

        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.write_error(e))?;
        file.write_all(bytes).map_err(|e| self.write_error(e))?;
        file.flush().map_err(|e| self.write_error(e))
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF files declare their byte order in the header; every multi-byte value
// goes through one of these.

/// Read a little-endian u16 from the first 2 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a big-endian u16 from the first 2 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from the first 4 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a big-endian u32 from the first 4 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from the first 8 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

/// Read a big-endian u64 from the first 8 bytes of a slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(word)
}
