//! Numeric sample formats and conversion to and from `f32`.
//!
//! Tiled octaves keep samples in their on-disk encoding. A [`SampleFormat`]
//! names that encoding (numeric kind plus bit width) and converts one raw
//! little-endian sample to a float.
//!
//! # 32-bit integers
//!
//! 32-bit integer samples are read through a 16-bit reinterpretation: only
//! the low 16 bits of the value survive (`70000u32` reads as `4464.0`).
//! Existing callers depend on these numbers, so the truncation is kept.

/// Numeric interpretation of a stored sample.
///
/// Codes follow the TIFF SampleFormat tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Unsigned integer (code 1)
    Unsigned,
    /// Two's complement signed integer (code 2)
    Signed,
    /// IEEE floating point (code 3)
    Float,
}

impl SampleKind {
    /// Map a TIFF SampleFormat code to a kind.
    pub fn from_tiff_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(SampleKind::Unsigned),
            2 => Some(SampleKind::Signed),
            3 => Some(SampleKind::Float),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SampleKind::Unsigned => "uint",
            SampleKind::Signed => "int",
            SampleKind::Float => "float",
        }
    }
}

/// Encoding of one stored sample: kind and bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    pub kind: SampleKind,
    pub bits: u16,
}

impl SampleFormat {
    pub const U8: Self = Self::new(SampleKind::Unsigned, 8);
    pub const U16: Self = Self::new(SampleKind::Unsigned, 16);
    pub const U32: Self = Self::new(SampleKind::Unsigned, 32);
    pub const I8: Self = Self::new(SampleKind::Signed, 8);
    pub const I16: Self = Self::new(SampleKind::Signed, 16);
    pub const I32: Self = Self::new(SampleKind::Signed, 32);
    pub const F32: Self = Self::new(SampleKind::Float, 32);
    pub const F64: Self = Self::new(SampleKind::Float, 64);

    pub const fn new(kind: SampleKind, bits: u16) -> Self {
        Self { kind, bits }
    }

    /// Bytes occupied by one sample.
    #[inline]
    pub const fn bytes(self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// Whether samples of this format convert to a number.
    ///
    /// Any other combination reads as NaN and cannot be written.
    pub const fn is_convertible(self) -> bool {
        matches!(
            (self.kind, self.bits),
            (SampleKind::Unsigned, 8 | 16 | 32)
                | (SampleKind::Signed, 8 | 16 | 32)
                | (SampleKind::Float, 32 | 64)
        )
    }

    /// Convert one little-endian raw sample to `f32`.
    ///
    /// Returns NaN for unsupported formats or when `raw` is shorter than
    /// one sample.
    pub fn to_float(self, raw: &[u8]) -> f32 {
        if !self.is_convertible() || raw.len() < self.bytes() {
            return f32::NAN;
        }

        match (self.kind, self.bits) {
            (SampleKind::Unsigned, 8) => raw[0] as f32,
            // 32-bit samples go through the same 16-bit read
            (SampleKind::Unsigned, 16 | 32) => u16::from_le_bytes([raw[0], raw[1]]) as f32,
            (SampleKind::Signed, 8) => raw[0] as i8 as f32,
            (SampleKind::Signed, 16 | 32) => i16::from_le_bytes([raw[0], raw[1]]) as f32,
            (SampleKind::Float, 32) => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            (SampleKind::Float, 64) => {
                let mut word = [0u8; 8];
                word.copy_from_slice(&raw[..8]);
                f64::from_le_bytes(word) as f32
            }
            _ => f32::NAN,
        }
    }

    /// Encode `value` as one little-endian sample into `out`.
    ///
    /// Integers are rounded to nearest and saturate at the type bounds; NaN
    /// becomes zero. Returns `false` for unsupported formats or a short
    /// output slice.
    pub fn write_float(self, value: f32, out: &mut [u8]) -> bool {
        if !self.is_convertible() || out.len() < self.bytes() {
            return false;
        }

        let rounded = value.round();
        match (self.kind, self.bits) {
            (SampleKind::Unsigned, 8) => out[0] = rounded as u8,
            (SampleKind::Unsigned, 16) => out[..2].copy_from_slice(&(rounded as u16).to_le_bytes()),
            (SampleKind::Unsigned, 32) => out[..4].copy_from_slice(&(rounded as u32).to_le_bytes()),
            (SampleKind::Signed, 8) => out[0] = (rounded as i8) as u8,
            (SampleKind::Signed, 16) => out[..2].copy_from_slice(&(rounded as i16).to_le_bytes()),
            (SampleKind::Signed, 32) => out[..4].copy_from_slice(&(rounded as i32).to_le_bytes()),
            (SampleKind::Float, 32) => out[..4].copy_from_slice(&value.to_le_bytes()),
            (SampleKind::Float, 64) => out[..8].copy_from_slice(&(value as f64).to_le_bytes()),
            _ => return false,
        }
        true
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.name(), self.bits)
    }
}

/// Convert one raw little-endian sample to `f32`.
///
/// Free-function form of [`SampleFormat::to_float`].
#[inline]
pub fn to_float(format: SampleFormat, raw: &[u8]) -> f32 {
    format.to_float(raw)
}
