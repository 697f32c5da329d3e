//! Tiled octave storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               FancyImage                │
//! └────────────────────┬────────────────────┘
//!                      │ read_pixel / write_pixel
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileStore                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  TiledLevel     │  │
//! │  │  (raw LE     │  │  per octave     │  │
//! │  │   tiles)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ range reads / writes
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        FileRangeReader (per file)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileStore`]: opens the octave ladder and serves single pixels
//! - [`TileCache`]: LRU cache of raw tiles with size-based eviction and
//!   modified-tile tracking
//! - [`Pixel`]: raw samples of one pixel plus their encoding

mod cache;
mod store;

pub use cache::{CachedTile, TileCache, TileKey};
pub use store::{Pixel, TileStore};
