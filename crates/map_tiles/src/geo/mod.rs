//! Conversions between local Cartesian space and slippy tile indices.
//!
//! The quadtree never assumes a particular projection. It talks to a
//! [`GeoSpace`], which maps local positions (metres, `z` up) to tile indices
//! and tile corners back to local positions.
//!
//! # Conventions
//!
//! - `local_to_slippy` returns the tile containing the point, clamped to the
//!   valid range at that zoom.
//! - `slippy_to_local` returns the north-west corner of the tile with `z = 0`.
//!   Indices outside the map are extrapolated, so `(x + 1, y + 1)` yields the
//!   south-east corner.

mod web_mercator;

pub use web_mercator::{WebMercatorSpace, EARTH_RADIUS, HALF_CIRCUMFERENCE};

use std::f64::consts::PI;

use glam::{DVec2, DVec3, IVec2};

use crate::types::TileKey;

/// Local <-> slippy transform consumed by the quadtree and renderer.
pub trait GeoSpace: Send + Sync {
  /// Tile containing `local` at `zoom`, clamped into the map.
  fn local_to_slippy(&self, local: DVec3, zoom: u8) -> IVec2;

  /// North-west corner of `tile` at `zoom`, in local space.
  fn slippy_to_local(&self, tile: IVec2, zoom: u8) -> DVec3;

  /// Corners of a tile in `[nw, ne, sw, se]` order at height `z`.
  fn tile_corners(&self, key: TileKey, z: f64) -> [DVec3; 4] {
    let base = IVec2::new(key.x, key.y);
    std::array::from_fn(|i| {
      let offset = IVec2::new((i & 1) as i32, (i >> 1) as i32);
      let corner = self.slippy_to_local(base + offset, key.zoom);
      DVec3::new(corner.x, corner.y, z)
    })
  }
}

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLong {
  pub lat: f64,
  pub lon: f64,
}

impl LatLong {
  pub const fn new(lat: f64, lon: f64) -> Self {
    Self { lat, lon }
  }
}

/// Fractional slippy position of a geographic point.
pub fn lat_long_to_slippy_f(position: LatLong, zoom: u8) -> DVec2 {
  let n = TileKey::tiles_per_side(zoom) as f64;
  let lat = position.lat.to_radians();
  let x = (position.lon + 180.0) / 360.0 * n;
  let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;
  DVec2::new(x, y)
}

/// Slippy tile containing a geographic point, clamped into the map.
pub fn lat_long_to_slippy(position: LatLong, zoom: u8) -> IVec2 {
  let max = TileKey::tiles_per_side(zoom) - 1;
  let tile = lat_long_to_slippy_f(position, zoom).floor();
  IVec2::new(
    (tile.x as i32).clamp(0, max),
    (tile.y as i32).clamp(0, max),
  )
}

/// Geographic position of a (possibly fractional) slippy coordinate.
pub fn slippy_to_lat_long(tile: DVec2, zoom: u8) -> LatLong {
  let n = TileKey::tiles_per_side(zoom) as f64;
  let lon = tile.x / n * 360.0 - 180.0;
  let m = PI - 2.0 * PI * tile.y / n;
  let lat = m.sinh().atan().to_degrees();
  LatLong::new(lat, lon)
}
