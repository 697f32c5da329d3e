//! Tile cache for decoded octave tiles.
//!
//! This module provides an LRU cache for raw tile buffers, so repeated
//! samples from the same neighborhood do not go back to the file.
//!
//! # Cache Key
//!
//! Tiles are cached by octave index and row-major tile index.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. The entry
//! just inserted is never evicted, so a capacity below one tile still
//! holds one tile. Evicted tiles that were modified are handed back to the
//! caller for write-back.

use lru::LruCache;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for one tile of one octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Octave index (0 = full resolution)
    pub octave: usize,

    /// Row-major tile index within the octave
    pub tile: usize,
}

impl TileKey {
    pub fn new(octave: usize, tile: usize) -> Self {
        Self { octave, tile }
    }
}

// =============================================================================
// Cached Tile
// =============================================================================

/// Tile bytes, little-endian samples, plus a modified flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    pub data: Vec<u8>,
    pub dirty: bool,
}

impl CachedTile {
    /// A tile as read from the file.
    pub fn clean(data: Vec<u8>) -> Self {
        Self { data, dirty: false }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for raw tiles with size-based capacity.
///
/// The cache is owned by one store and is not shared between threads.
pub struct TileCache {
    /// The underlying LRU cache
    cache: LruCache<TileKey, CachedTile>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: usize,
}

impl TileCache {
    /// Create a new tile cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            max_size,
            current_size: 0,
        }
    }

    /// Get a tile, marking it as recently used.
    pub fn get(&mut self, key: &TileKey) -> Option<&CachedTile> {
        self.cache.get(key)
    }

    /// Get a tile for modification, marking it as recently used.
    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut CachedTile> {
        self.cache.get_mut(key)
    }

    /// Check if a tile is cached without updating LRU order.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache.contains(key)
    }

    /// Store a tile.
    ///
    /// Least-recently-used entries are evicted until the cache is within
    /// capacity. Returns the evicted tiles that still carry unsaved
    /// modifications; clean tiles are dropped.
    pub fn put(&mut self, key: TileKey, tile: CachedTile) -> Vec<(TileKey, CachedTile)> {
        let tile_size = tile.data.len();

        if let Some(old) = self.cache.put(key, tile) {
            self.current_size = self.current_size.saturating_sub(old.data.len());
        }
        self.current_size += tile_size;

        let mut dirty = Vec::new();
        while self.current_size > self.max_size && self.cache.len() > 1 {
            match self.cache.pop_lru() {
                Some((evicted_key, evicted)) => {
                    self.current_size = self.current_size.saturating_sub(evicted.data.len());
                    if evicted.dirty {
                        dirty.push((evicted_key, evicted));
                    }
                }
                None => break,
            }
        }
        dirty
    }

    /// Iterate over modified tiles.
    pub fn dirty_tiles_mut(&mut self) -> impl Iterator<Item = (&TileKey, &mut CachedTile)> {
        self.cache.iter_mut().filter(|(_, tile)| tile.dirty)
    }

    /// Number of modified tiles.
    pub fn dirty_count(&self) -> usize {
        self.cache.iter().filter(|(_, tile)| tile.dirty).count()
    }

    /// Get the current number of cached tiles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

// =============================================================================
// Tests
// =============================================================================
