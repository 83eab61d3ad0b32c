//! Elevation tiles bound alongside map imagery.

use glam::{DVec2, DVec3, Vec4};
use smallvec::SmallVec;

use crate::constants::{MAX_ELEVATION_TILES, TILE_SAMPLE_COUNT};
use crate::types::{TextureHandle, TileKey};

/// A height texture covering an axis-aligned local rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElevationTile {
  pub texture: TextureHandle,
  pub min: DVec2,
  pub max: DVec2,
}

impl ElevationTile {
  /// `(u, v)` of a local position; `v` runs north to south.
  pub fn uv(&self, position: DVec2) -> DVec2 {
    let range = self.max - self.min;
    DVec2::new(
      (position.x - self.min.x) / range.x,
      1.0 - (position.y - self.min.y) / range.y,
    )
  }
}

pub type ElevationTiles = SmallVec<[ElevationTile; MAX_ELEVATION_TILES]>;

/// Supplies elevation tiles overlapping a map tile.
pub trait ElevationSource {
  /// At most [`MAX_ELEVATION_TILES`] tiles overlapping `(min, max)`.
  fn tiles_for(&self, key: TileKey, min: DVec2, max: DVec2) -> ElevationTiles;
}

/// Flat terrain.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoElevation;

impl ElevationSource for NoElevation {
  fn tiles_for(&self, _key: TileKey, _min: DVec2, _max: DVec2) -> ElevationTiles {
    ElevationTiles::new()
  }
}

/// Per-sample UVs into up to two elevation tiles, packed `xy`/`zw`.
pub fn elevation_uvs(tiles: &[ElevationTile], samples: &[DVec3; TILE_SAMPLE_COUNT]) -> [Vec4; TILE_SAMPLE_COUNT] {
  samples.map(|sample| {
    let mut packed = [0.0f32; 4];
    for (slot, tile) in tiles.iter().take(MAX_ELEVATION_TILES).enumerate() {
      let uv = tile.uv(sample.truncate()).as_vec2();
      packed[slot * 2] = uv.x;
      packed[slot * 2 + 1] = uv.y;
    }
    Vec4::from_array(packed)
  })
}
