//! Core value types shared across the tile pipeline.
//!
//! # Tile addressing
//!
//! ```text
//!        x ->
//!   y  +-------+-------+
//!   |  | child | child |      child c of (z, x, y) is
//!   v  |   0   |   1   |      (z + 1, 2x + (c & 1), 2y + (c >> 1))
//!      +-------+-------+
//!      | child | child |
//!      |   2   |   3   |
//!      +-------+-------+
//! ```
//!
//! Row 0 is the north edge, so `y` grows southwards.

use std::fmt;

use crate::constants::MAX_SLIPPY_ZOOM;

// =============================================================================
// TileKey
// =============================================================================

/// Slippy map tile address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
  pub zoom: u8,
  pub x: i32,
  pub y: i32,
}

impl TileKey {
  /// The single tile covering the whole map.
  pub const ROOT: TileKey = TileKey { zoom: 0, x: 0, y: 0 };

  #[inline]
  pub const fn new(zoom: u8, x: i32, y: i32) -> Self {
    Self { zoom, x, y }
  }

  /// Tiles along one axis at `zoom`.
  #[inline]
  pub const fn tiles_per_side(zoom: u8) -> i32 {
    1 << zoom
  }

  /// True when the key addresses a tile inside the map.
  pub fn is_valid(&self) -> bool {
    let n = Self::tiles_per_side(self.zoom);
    self.zoom <= MAX_SLIPPY_ZOOM && (0..n).contains(&self.x) && (0..n).contains(&self.y)
  }

  /// Child `index` (0..4) one zoom level deeper.
  #[inline]
  pub fn child(&self, index: usize) -> TileKey {
    debug_assert!(index < 4);
    TileKey::new(
      self.zoom + 1,
      self.x * 2 + (index & 1) as i32,
      self.y * 2 + (index >> 1) as i32,
    )
  }

  /// Parent tile, `None` for the root.
  pub fn parent(&self) -> Option<TileKey> {
    if self.zoom == 0 {
      return None;
    }
    Some(TileKey::new(self.zoom - 1, self.x >> 1, self.y >> 1))
  }

  /// Position of this tile inside its parent's child block.
  #[inline]
  pub fn child_index(&self) -> usize {
    (((self.y & 1) << 1) | (self.x & 1)) as usize
  }

  /// Ancestor at a coarser (or equal) zoom level.
  pub fn ancestor_at(&self, zoom: u8) -> Option<TileKey> {
    if zoom > self.zoom {
      return None;
    }
    let shift = self.zoom - zoom;
    Some(TileKey::new(zoom, self.x >> shift, self.y >> shift))
  }

  /// True when `other` lies inside this tile (a tile contains itself).
  pub fn contains(&self, other: &TileKey) -> bool {
    other.ancestor_at(self.zoom) == Some(*self)
  }

  /// Same-zoom tile across `edge`. May be outside the map.
  #[inline]
  pub fn neighbour(&self, edge: Edge) -> TileKey {
    let (dx, dy) = edge.offset();
    TileKey::new(self.zoom, self.x + dx, self.y + dy)
  }
}

impl fmt::Display for TileKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
  }
}

// =============================================================================
// Edges and neighbour masks
// =============================================================================

/// Cardinal tile edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
  /// North, towards y - 1.
  Up,
  /// East, towards x + 1.
  Right,
  /// South, towards y + 1.
  Down,
  /// West, towards x - 1.
  Left,
}

impl Edge {
  pub const ALL: [Edge; 4] = [Edge::Up, Edge::Right, Edge::Down, Edge::Left];

  /// Slippy offset to the neighbour across this edge.
  #[inline]
  pub const fn offset(self) -> (i32, i32) {
    match self {
      Edge::Up => (0, -1),
      Edge::Right => (1, 0),
      Edge::Down => (0, 1),
      Edge::Left => (-1, 0),
    }
  }

  #[inline]
  pub const fn bit(self) -> u8 {
    match self {
      Edge::Up => NeighbourMask::UP,
      Edge::Right => NeighbourMask::RIGHT,
      Edge::Down => NeighbourMask::DOWN,
      Edge::Left => NeighbourMask::LEFT,
    }
  }
}

/// Set of edges whose neighbour is covered by a coarser tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NeighbourMask(u8);

impl NeighbourMask {
  pub const UP: u8 = 1;
  pub const RIGHT: u8 = 2;
  pub const DOWN: u8 = 4;
  pub const LEFT: u8 = 8;

  pub const NONE: NeighbourMask = NeighbourMask(0);

  /// Builds a mask from raw bits; bits above the low four are dropped.
  #[inline]
  pub const fn from_bits(bits: u8) -> Self {
    Self(bits & 0xf)
  }

  #[inline]
  pub const fn bits(self) -> u8 {
    self.0
  }

  /// Index into the mesh library.
  #[inline]
  pub const fn index(self) -> usize {
    self.0 as usize
  }

  #[inline]
  pub fn contains(self, edge: Edge) -> bool {
    self.0 & edge.bit() != 0
  }

  #[inline]
  pub fn insert(&mut self, edge: Edge) {
    self.0 |= edge.bit();
  }

  #[inline]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }
}

// =============================================================================
// Decoded imagery and backend handles
// =============================================================================

/// Decoded tile imagery, tightly packed RGBA8 rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileImage {
  pub width: u32,
  pub height: u32,
  pub pixels: Vec<u8>,
}

impl TileImage {
  /// Image filled with a single colour.
  pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
    let count = width as usize * height as usize;
    let mut pixels = Vec::with_capacity(count * 4);
    for _ in 0..count {
      pixels.extend_from_slice(&rgba);
    }
    Self {
      width,
      height,
      pixels,
    }
  }
}

/// Opaque texture id issued by a [`RenderBackend`](crate::renderer::RenderBackend).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque mesh id issued by a [`RenderBackend`](crate::renderer::RenderBackend).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

// =============================================================================
// Load status
// =============================================================================

/// Lifecycle of a tile's imagery.
///
/// ```text
/// None -> InQueue -> Downloading -> Downloaded -> Loaded
///            ^            |
///            +-- retry ---+--> Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadStatus {
  None = 0,
  InQueue = 1,
  Downloading = 2,
  Downloaded = 3,
  Loaded = 4,
  Failed = 5,
}

impl LoadStatus {
  #[inline]
  pub const fn from_u8(value: u8) -> LoadStatus {
    match value {
      1 => LoadStatus::InQueue,
      2 => LoadStatus::Downloading,
      3 => LoadStatus::Downloaded,
      4 => LoadStatus::Loaded,
      5 => LoadStatus::Failed,
      _ => LoadStatus::None,
    }
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
