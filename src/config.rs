//! Configuration for opening images and for the command-line tool.
//!
//! # Option strings
//!
//! [`FancyImage::open`](crate::FancyImage::open) takes a compact,
//! comma-separated option string:
//!
//! | token | effect |
//! |---|---|
//! | `r`, `read` | enable read |
//! | `w`, `write` | enable write (forces `max_octaves = 1`) |
//! | `rw`, `wr` | enable both |
//! | `megabytes=<float>` | tile cache budget for tiled images |
//! | `octaves=<int>` | octave ceiling |
//! | `verbose=<int>` | verbosity level |
//!
//! Unknown tokens and malformed numbers are ignored. Later tokens override
//! earlier ones. Parsing never fails.
//!
//! ```
//! use fancy_image::Options;
//!
//! let options = Options::parse("octaves=8,read,write");
//! assert!(options.allow_write);
//! assert_eq!(options.max_octaves, 1);
//! ```

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Default Values
// =============================================================================

/// Default tile cache budget in megabytes.
pub const DEFAULT_MEGABYTES: f64 = 100.0;

/// Default octave ceiling.
pub const DEFAULT_MAX_OCTAVES: usize = 30;

/// Default verbosity.
pub const DEFAULT_VERBOSITY: u32 = 0;

// =============================================================================
// Options
// =============================================================================

/// Immutable configuration for one opened image.
///
/// Build it with [`Options::parse`] or [`OptionsBuilder`]; both apply the
/// write rule (write access forces a single octave) exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// Reads are allowed (always true in practice; kept for the option syntax)
    pub allow_read: bool,

    /// `set_sample` may modify the image
    pub allow_write: bool,

    /// Memory budget for the tiled backend, in megabytes
    pub memory_budget_mb: f64,

    /// Octave ceiling. The in-memory pyramid derives up to this many
    /// octaves below octave 0; the tiled store exposes at most this many
    pub max_octaves: usize,

    /// Values above zero promote geometry reports to `info` level
    pub verbosity: u32,
}

impl Default for Options {
    fn default() -> Self {
        OptionsBuilder::new().build()
    }
}

impl Options {
    /// Parse a comma-separated option string.
    ///
    /// Tokens are matched exactly, so `" w"` is an unknown token.
    pub fn parse(option_string: &str) -> Self {
        option_string
            .split(',')
            .filter(|token| !token.is_empty())
            .fold(OptionsBuilder::new(), OptionsBuilder::token)
            .build()
    }

    /// Start a builder from the defaults.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Whether geometry reports should be logged at `info` level.
    #[inline]
    pub fn is_verbose(&self) -> bool {
        self.verbosity > 0
    }

    /// Tile cache budget in bytes.
    pub fn memory_budget_bytes(&self) -> usize {
        (self.memory_budget_mb * 1024.0 * 1024.0) as usize
    }
}

/// Builder for [`Options`].
#[derive(Debug, Clone, Copy)]
pub struct OptionsBuilder {
    allow_read: bool,
    allow_write: bool,
    memory_budget_mb: f64,
    max_octaves: usize,
    verbosity: u32,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            allow_read: true,
            allow_write: false,
            memory_budget_mb: DEFAULT_MEGABYTES,
            max_octaves: DEFAULT_MAX_OCTAVES,
            verbosity: DEFAULT_VERBOSITY,
        }
    }

    pub fn read(mut self, allow: bool) -> Self {
        self.allow_read = allow;
        self
    }

    pub fn write(mut self, allow: bool) -> Self {
        self.allow_write = allow;
        self
    }

    /// Set the tile cache budget. Negative or non-finite values are ignored.
    pub fn megabytes(mut self, megabytes: f64) -> Self {
        if megabytes.is_finite() && megabytes >= 0.0 {
            self.memory_budget_mb = megabytes;
        }
        self
    }

    pub fn max_octaves(mut self, octaves: usize) -> Self {
        self.max_octaves = octaves;
        self
    }

    pub fn verbosity(mut self, level: u32) -> Self {
        self.verbosity = level;
        self
    }

    /// Apply one option-string token.
    pub fn token(self, token: &str) -> Self {
        match token {
            "r" | "read" => return self.read(true),
            "w" | "write" => return self.write(true),
            "rw" | "wr" => return self.read(true).write(true),
            _ => {}
        }

        let Some((key, value)) = token.split_once('=') else {
            return self;
        };

        match key {
            "megabytes" => match value.parse::<f64>() {
                Ok(mb) => self.megabytes(mb),
                Err(_) => self,
            },
            "octaves" => match value.parse::<usize>() {
                Ok(n) => self.max_octaves(n),
                Err(_) => self,
            },
            "verbose" => match value.parse::<u32>() {
                Ok(level) => self.verbosity(level),
                Err(_) => self,
            },
            _ => self,
        }
    }

    /// Finish the configuration.
    ///
    /// Pyramidal writes are not supported, so write access pins the
    /// octave ceiling to 1.
    pub fn build(self) -> Options {
        let max_octaves = if self.allow_write { 1 } else { self.max_octaves };

        Options {
            allow_read: self.allow_read,
            allow_write: self.allow_write,
            memory_budget_mb: self.memory_budget_mb,
            max_octaves,
            verbosity: self.verbosity,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Fancy Image - octave-indexed sampling over plain and tiled images.
#[derive(Parser, Debug, Clone)]
#[command(name = "fancy-image")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the `fancy-image` binary.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the geometry of an image and one of its samples.
    Sample(SampleConfig),

    /// Crop a square around a center point at a given octave.
    Crop(CropConfig),

    /// Print the backend and octave ladder of an image.
    Info(InfoConfig),
}

/// Arguments of `fancy-image sample`.
#[derive(Args, Debug, Clone)]
pub struct SampleConfig {
    /// Image path, octave template, or "-" for standard input.
    pub image: String,

    /// Option string, e.g. "octaves=4,verbose=1".
    pub options: String,

    /// Octave index.
    #[arg(allow_negative_numbers = true)]
    pub octave: isize,

    /// Column.
    #[arg(allow_negative_numbers = true)]
    pub x: isize,

    /// Row.
    #[arg(allow_negative_numbers = true)]
    pub y: isize,

    /// Channel (clamped into range).
    #[arg(allow_negative_numbers = true)]
    pub channel: isize,
}

/// Arguments of `fancy-image crop`.
#[derive(Args, Debug, Clone)]
pub struct CropConfig {
    /// Input image path, octave template, or "-" for standard input.
    pub input: String,

    /// Option string, e.g. "megabytes=500".
    pub options: String,

    /// Octave to crop from.
    #[arg(allow_negative_numbers = true)]
    pub octave: isize,

    /// Center column.
    #[arg(allow_negative_numbers = true)]
    pub cx: isize,

    /// Center row.
    #[arg(allow_negative_numbers = true)]
    pub cy: isize,

    /// Side length of the square crop.
    pub diameter: usize,

    /// Output image path.
    pub output: String,
}

impl CropConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.diameter == 0 {
            return Err("diameter must be greater than 0".to_string());
        }
        if self.output.is_empty() {
            return Err("output path is required".to_string());
        }
        Ok(())
    }
}

/// Arguments of `fancy-image info`.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Image path, octave template, or "-" for standard input.
    pub image: String,

    /// Option string.
    #[arg(env = "FANCY_OPTIONS", default_value = "")]
    pub options: String,
}

// =============================================================================
// Tests
// =============================================================================
