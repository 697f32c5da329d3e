//! TIFF tag value reading.
//!
//! Values are stored either inline in the IFD entry (small values) or at an
//! offset in the file (arrays such as TileOffsets). Arrays are fetched with
//! a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::{FieldType, TiffTag};

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file, respecting its byte order and
/// classic/BigTIFF layout.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order, self.header.is_bigtiff);
        let len = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: "unknown",
            message: format!("value of {} bytes cannot be addressed", size),
        })?;
        Ok(self.reader.read_exact_at(offset, len)?)
    }

    /// Read a single unsigned value (Byte, Short, Long or Long8).
    pub fn read_u64(&self, tag: TiffTag, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }

        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected count 1, got {}", entry.count),
            });
        }

        let values = self.read_u64_array(tag, entry)?;
        values.first().copied().ok_or(TiffError::MissingTag(tag.name()))
    }

    /// Read an array of unsigned values, widened to u64.
    ///
    /// This is the primary method for reading TileOffsets, TileByteCounts,
    /// BitsPerSample and SampleFormat.
    pub fn read_u64_array(&self, tag: TiffTag, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !field_type.is_unsigned_integer() {
            return Err(TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected an unsigned integer type, got {:?}", field_type),
            });
        }

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry)?;
        let byte_order = self.header.byte_order;
        let width = field_type.size_in_bytes();

        let values = bytes
            .chunks_exact(width)
            .map(|chunk| match width {
                1 => chunk[0] as u64,
                2 => byte_order.read_u16(chunk) as u64,
                4 => byte_order.read_u32(chunk) as u64,
                _ => byte_order.read_u64(chunk),
            })
            .collect();

        Ok(values)
    }
}
