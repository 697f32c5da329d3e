//! The octave-aware image handle.
//!
//! [`FancyImage`] hides whether pixels come from a decoded image with an
//! in-memory pyramid or from a tiled store on disk. Every sample is
//! addressed as `(octave, x, y, channel)`.
//!
//! # Invalid Access
//!
//! - Reads outside the octave ladder or the octave bounds give NaN.
//! - The channel of a read is clamped into range.
//! - Writes report failure with `false`: read-only image, coordinates or
//!   channel outside octave 0, or a store that rejects the write.
//!
//! # Example
//!
//! ```no_run
//! use fancy_image::FancyImage;
//!
//! let image = FancyImage::open("slide_%d.tif", "megabytes=256,verbose=1")?;
//! let top = image.octave_count() - 1;
//! println!(
//!     "{}x{} at octave {}, first sample {}",
//!     image.width_at_octave(top as isize),
//!     image.height_at_octave(top as isize),
//!     top,
//!     image.sample_at_octave(top as isize, 0, 0, 0),
//! );
//! image.close()?;
//! # Ok::<(), fancy_image::FancyImageError>(())
//! ```

use tracing::{debug, info};

use crate::codec;
use crate::config::Options;
use crate::error::FancyImageError;
use crate::format::{select_backend, Backend};
use crate::pyramid::{self, Octave};
use crate::tile::TileStore;

// =============================================================================
// Octave Storage
// =============================================================================

/// What the handle needs from a backend.
///
/// Coordinates reaching these methods are non-negative; the octave and
/// channel have already been checked against the ladder.
trait OctaveStore {
    fn channels(&self) -> usize;

    fn octave_count(&self) -> usize;

    fn octave_dims(&self, octave: usize) -> Option<(usize, usize)>;

    /// One sample as `f32`, NaN outside the octave.
    fn read_sample(&self, octave: usize, x: usize, y: usize, channel: usize) -> f32;

    /// Overwrite one sample of octave 0.
    fn write_sample(&mut self, x: usize, y: usize, channel: usize, value: f32) -> bool;

    /// Release the storage, reporting any write-back failure.
    fn close(self: Box<Self>) -> Result<(), FancyImageError>;
}

/// Decoded image plus its box-filtered octaves.
struct InMemoryPyramid {
    octaves: Vec<Octave>,
    channels: usize,
}

impl OctaveStore for InMemoryPyramid {
    fn channels(&self) -> usize {
        self.channels
    }

    fn octave_count(&self) -> usize {
        self.octaves.len()
    }

    fn octave_dims(&self, octave: usize) -> Option<(usize, usize)> {
        self.octaves.get(octave).map(|o| (o.width, o.height))
    }

    fn read_sample(&self, octave: usize, x: usize, y: usize, channel: usize) -> f32 {
        match self.octaves.get(octave) {
            Some(o) if x < o.width && y < o.height => {
                o.data[o.index(x, y, channel, self.channels)]
            }
            _ => f32::NAN,
        }
    }

    // Coarser octaves are left as they were built
    fn write_sample(&mut self, x: usize, y: usize, channel: usize, value: f32) -> bool {
        let channels = self.channels;
        match self.octaves.first_mut() {
            Some(base) if x < base.width && y < base.height => {
                let index = base.index(x, y, channel, channels);
                base.data[index] = value;
                true
            }
            _ => false,
        }
    }

    fn close(self: Box<Self>) -> Result<(), FancyImageError> {
        Ok(())
    }
}

/// Adapter over the on-disk tile store.
struct TiledStore {
    store: TileStore,
}

impl OctaveStore for TiledStore {
    fn channels(&self) -> usize {
        self.store.channels()
    }

    fn octave_count(&self) -> usize {
        self.store.octave_count()
    }

    fn octave_dims(&self, octave: usize) -> Option<(usize, usize)> {
        self.store.octave_dims(octave)
    }

    fn read_sample(&self, octave: usize, x: usize, y: usize, channel: usize) -> f32 {
        self.store
            .read_pixel(octave, x, y)
            .map_or(f32::NAN, |pixel| pixel.to_float(channel))
    }

    /// Read the whole pixel, replace one channel, write the pixel back.
    ///
    /// Not atomic: concurrent writers to the same pixel can lose updates.
    fn write_sample(&mut self, x: usize, y: usize, channel: usize, value: f32) -> bool {
        let Some(pixel) = self.store.read_pixel(0, x, y) else {
            return false;
        };

        let mut values: Vec<f32> = (0..self.store.channels())
            .map(|c| pixel.to_float(c))
            .collect();
        let Some(slot) = values.get_mut(channel) else {
            return false;
        };
        *slot = value;

        match self.store.write_pixel(x, y, &values) {
            Ok(()) => true,
            Err(e) => {
                debug!(x, y, channel, error = %e, "Tiled write rejected");
                false
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), FancyImageError> {
        Ok(self.store.close()?)
    }
}

// =============================================================================
// FancyImage
// =============================================================================

/// An image addressable by octave, backed by memory or by tiles on disk.
///
/// Not meant for concurrent use; wrap it in a lock to share it.
pub struct FancyImage {
    width: usize,
    height: usize,
    channels: usize,
    octave_count: usize,
    backend: Backend,
    options: Options,
    mutated: bool,
    store: Box<dyn OctaveStore>,
}

impl std::fmt::Debug for FancyImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FancyImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("octave_count", &self.octave_count)
            .field("backend", &self.backend)
            .field("mutated", &self.mutated)
            .finish()
    }
}

impl FancyImage {
    /// Open `resource_id` with a comma-separated option string.
    ///
    /// See [`Options::parse`] for the option syntax.
    pub fn open(resource_id: &str, option_string: &str) -> Result<Self, FancyImageError> {
        Self::open_with(resource_id, Options::parse(option_string))
    }

    /// Open `resource_id` with an already built configuration.
    pub fn open_with(resource_id: &str, options: Options) -> Result<Self, FancyImageError> {
        let backend = select_backend(resource_id);

        let store: Box<dyn OctaveStore> = match backend {
            Backend::Tiled => Box::new(TiledStore {
                store: TileStore::open(
                    resource_id,
                    options.memory_budget_mb,
                    options.max_octaves,
                    options.allow_write,
                )?,
            }),
            Backend::InMemory => {
                let decoded = codec::decode(resource_id)?;
                let octaves = pyramid::build(
                    decoded.data,
                    decoded.width,
                    decoded.height,
                    decoded.channels,
                    options.max_octaves,
                    options.is_verbose(),
                )?;
                Box::new(InMemoryPyramid {
                    octaves,
                    channels: decoded.channels,
                })
            }
        };

        let (width, height) = store.octave_dims(0).unwrap_or((0, 0));
        let image = FancyImage {
            width,
            height,
            channels: store.channels(),
            octave_count: store.octave_count(),
            backend,
            options,
            mutated: false,
            store,
        };

        if options.is_verbose() {
            // The in-memory builder reports its own ladder
            if backend == Backend::Tiled {
                for octave in 0..image.octave_count {
                    if let Some((width, height)) = image.store.octave_dims(octave) {
                        info!(octave, width, height, "Tiled octave");
                    }
                }
            }
            info!(
                resource = resource_id,
                width = image.width,
                height = image.height,
                channels = image.channels,
                octaves = image.octave_count,
                max_octaves = options.max_octaves,
                backend = backend.name(),
                megabytes = options.memory_budget_mb,
                "Opened fancy image"
            );
        } else {
            debug!(
                resource = resource_id,
                width = image.width,
                height = image.height,
                channels = image.channels,
                octaves = image.octave_count,
                backend = backend.name(),
                "Opened fancy image"
            );
        }

        Ok(image)
    }

    /// Width of octave 0.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of octave 0.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Channels per pixel, identical in every octave.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of octaves, at least one.
    pub fn octave_count(&self) -> usize {
        self.octave_count
    }

    /// Which backend serves the samples.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Configuration the image was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Whether a write has succeeded since opening.
    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    fn octave_index(&self, octave: isize) -> Option<usize> {
        usize::try_from(octave)
            .ok()
            .filter(|&o| o < self.octave_count)
    }

    /// Width of `octave`, 0 outside the ladder.
    pub fn width_at_octave(&self, octave: isize) -> usize {
        self.octave_index(octave)
            .and_then(|o| self.store.octave_dims(o))
            .map_or(0, |(w, _)| w)
    }

    /// Height of `octave`, 0 outside the ladder.
    pub fn height_at_octave(&self, octave: isize) -> usize {
        self.octave_index(octave)
            .and_then(|o| self.store.octave_dims(o))
            .map_or(0, |(_, h)| h)
    }

    /// Sample of octave 0.
    pub fn sample(&self, x: isize, y: isize, channel: isize) -> f32 {
        self.sample_at_octave(0, x, y, channel)
    }

    /// Sample `(x, y, channel)` of `octave` as `f32`.
    ///
    /// NaN when the octave or the pixel does not exist. The channel is
    /// clamped into `0..channels`.
    pub fn sample_at_octave(&self, octave: isize, x: isize, y: isize, channel: isize) -> f32 {
        let Some(octave) = self.octave_index(octave) else {
            return f32::NAN;
        };
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return f32::NAN;
        };

        let last_channel = self.channels.saturating_sub(1);
        let channel = usize::try_from(channel).map_or(0, |c| c.min(last_channel));
        self.store.read_sample(octave, x, y, channel)
    }

    /// Overwrite sample `(x, y, channel)` of octave 0.
    ///
    /// Returns `false` without touching anything when the image was opened
    /// without write access or the position is outside octave 0. Other
    /// octaves are not recomputed.
    pub fn set_sample(&mut self, x: isize, y: isize, channel: isize, value: f32) -> bool {
        if !self.options.allow_write {
            return false;
        }

        let in_range = |v: isize, bound: usize| usize::try_from(v).ok().filter(|&v| v < bound);
        let (Some(x), Some(y), Some(channel)) = (
            in_range(x, self.width),
            in_range(y, self.height),
            in_range(channel, self.channels),
        ) else {
            return false;
        };

        let written = self.store.write_sample(x, y, channel, value);
        if written {
            self.mutated = true;
        }
        written
    }

    /// Release the image.
    ///
    /// Tiled images write back modified tiles first; their failure is
    /// returned. Dropping the handle releases it too, but only logs
    /// write-back failures.
    pub fn close(self) -> Result<(), FancyImageError> {
        debug!(backend = self.backend.name(), mutated = self.mutated, "Closing fancy image");
        self.store.close()
    }
}
