//! Per-draw geometry helpers.

use glam::{DMat4, DVec3, IVec2, Vec4};

use crate::constants::TILE_SAMPLE_COUNT;
use crate::geo::GeoSpace;
use crate::types::TileKey;

/// 3x3 sample grid over a tile in local space at height `z`: corners, edge
/// midpoints and centre, row-major from the north-west corner.
///
/// Taken from the tile's children at `zoom + 1` so the points land exactly
/// on the child corners the finer neighbours use.
pub fn sample_points(space: &dyn GeoSpace, key: TileKey, z: f64) -> [DVec3; TILE_SAMPLE_COUNT] {
  let base = IVec2::new(key.x * 2, key.y * 2);
  std::array::from_fn(|t| {
    let tile = base + IVec2::new((t % 3) as i32, (t / 3) as i32);
    let local = space.slippy_to_local(tile, key.zoom + 1);
    DVec3::new(local.x, local.y, z)
  })
}

/// Eye-space sample positions. `view` already includes the map height
/// translation, so the samples are taken at `z = 0`.
pub fn eye_positions(view: &DMat4, samples: &[DVec3; TILE_SAMPLE_COUNT]) -> [Vec4; TILE_SAMPLE_COUNT] {
  samples.map(|s| (*view * s.truncate().extend(0.0).extend(1.0)).as_vec4())
}

/// Sub-rectangle of `ancestor`'s texture covering `tile`, as
/// `(u offset, v offset, u scale, v scale)`.
pub fn ancestor_uv(tile: TileKey, ancestor: TileKey) -> Vec4 {
  debug_assert!(ancestor.contains(&tile));
  let depth = (tile.zoom - ancestor.zoom) as i32;
  debug_assert!(depth < 31, "ancestor shift overflows i32");
  let scale = 1.0 / (1u64 << depth) as f32;
  let u = (tile.x - (ancestor.x << depth)) as f32 * scale;
  let v = (tile.y - (ancestor.y << depth)) as f32 * scale;
  Vec4::new(u, v, scale, scale)
}

/// Texture coordinates covering the full image.
pub const FULL_UV: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
