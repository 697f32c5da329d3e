//! Backend selection.
//!
//! Decides whether an identifier should be opened through the tiled store
//! or decoded whole and turned into an in-memory pyramid.
//!
//! # Detection Logic
//!
//! 1. `"-"` (standard input) is always a plain image
//! 2. Read the TIFF header and first IFD of the identifier
//! 3. If that fails, retry once with octave 0 substituted into the
//!    identifier (for octave templates such as `slide_%d.tif`)
//! 4. A first IFD carrying tile dimensions selects the tiled store
//! 5. Anything else, including unreadable resources, is a plain image;
//!    decoding reports the real error later

use tracing::debug;

use crate::error::TiffError;
use crate::io::FileRangeReader;

use super::template::octave_path;
use super::tiff::{Ifd, TiffHeader};

/// Identifier that stands for standard input.
pub const STDIN_IDENTIFIER: &str = "-";

// =============================================================================
// Backend
// =============================================================================

/// Storage backing an opened image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Decoded whole, pyramid built in memory
    InMemory,

    /// Pre-tiled multi-octave TIFF, read on demand
    Tiled,
}

impl Backend {
    /// Get a human-readable name for the backend.
    pub const fn name(&self) -> &'static str {
        match self {
            Backend::InMemory => "in-memory pyramid",
            Backend::Tiled => "tiled store",
        }
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Choose the backend for `resource_id`.
///
/// Never fails: unreadable metadata routes to [`Backend::InMemory`].
pub fn select_backend(resource_id: &str) -> Backend {
    if resource_id == STDIN_IDENTIFIER {
        return Backend::InMemory;
    }

    let probe = probe_tiled(resource_id).or_else(|first_err| {
        let fallback = octave_path(resource_id, 0);
        debug!(
            resource = resource_id,
            fallback = %fallback,
            error = %first_err,
            "metadata probe failed, retrying with octave 0"
        );
        probe_tiled(&fallback)
    });

    match probe {
        Ok(true) => Backend::Tiled,
        Ok(false) => Backend::InMemory,
        Err(e) => {
            debug!(resource = resource_id, error = %e, "no TIFF metadata, treating as plain image");
            Backend::InMemory
        }
    }
}

/// Read the header and first IFD of `path` and report whether it is tiled.
pub fn probe_tiled(path: &str) -> Result<bool, TiffError> {
    let reader = FileRangeReader::open(path)?;
    let header = TiffHeader::read(&reader)?;
    let ifd = Ifd::read(&reader, &header, header.first_ifd_offset)?;
    Ok(ifd.is_tiled())
}

// =============================================================================
// Tests
// =============================================================================
