//! Spherical web mercator local space.

use std::f64::consts::PI;

use glam::{DVec2, DVec3, IVec2};

use super::{GeoSpace, LatLong};
use crate::types::TileKey;

/// WGS84 equatorial radius used by web mercator.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the projected equator length; mercator x/y span `[-H, H]`.
pub const HALF_CIRCUMFERENCE: f64 = PI * EARTH_RADIUS;

/// Local metres on the web mercator plane, offset by an origin.
///
/// `x` grows east, `y` grows north, `z` is height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WebMercatorSpace {
  origin: DVec2,
}

impl WebMercatorSpace {
  /// Space whose local origin sits at mercator coordinate `origin`.
  pub const fn with_origin(origin: DVec2) -> Self {
    Self { origin }
  }

  /// Space centred on a geographic position.
  pub fn centred_on(position: LatLong) -> Self {
    Self::with_origin(Self::project(position))
  }

  /// Space centred on the middle of a tile.
  pub fn centred_on_tile(key: TileKey) -> Self {
    let world = Self::with_origin(DVec2::ZERO);
    let nw = world.slippy_to_local(IVec2::new(key.x, key.y), key.zoom);
    let se = world.slippy_to_local(IVec2::new(key.x + 1, key.y + 1), key.zoom);
    Self::with_origin(((nw + se) * 0.5).truncate())
  }

  pub fn origin(&self) -> DVec2 {
    self.origin
  }

  /// Mercator metres of a geographic position.
  pub fn project(position: LatLong) -> DVec2 {
    let lat = position.lat.to_radians();
    DVec2::new(
      EARTH_RADIUS * position.lon.to_radians(),
      EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
    )
  }

  /// Width of one tile at `zoom`, in metres.
  pub fn tile_size(zoom: u8) -> f64 {
    2.0 * HALF_CIRCUMFERENCE / TileKey::tiles_per_side(zoom) as f64
  }
}

impl GeoSpace for WebMercatorSpace {
  fn local_to_slippy(&self, local: DVec3, zoom: u8) -> IVec2 {
    let size = Self::tile_size(zoom);
    let max = TileKey::tiles_per_side(zoom) - 1;
    let mercator = local.truncate() + self.origin;
    let x = ((mercator.x + HALF_CIRCUMFERENCE) / size).floor();
    let y = ((HALF_CIRCUMFERENCE - mercator.y) / size).floor();
    IVec2::new(
      (x as i64).clamp(0, max as i64) as i32,
      (y as i64).clamp(0, max as i64) as i32,
    )
  }

  fn slippy_to_local(&self, tile: IVec2, zoom: u8) -> DVec3 {
    let size = Self::tile_size(zoom);
    let x = tile.x as f64 * size - HALF_CIRCUMFERENCE;
    let y = HALF_CIRCUMFERENCE - tile.y as f64 * size;
    DVec3::new(x - self.origin.x, y - self.origin.y, 0.0)
  }
}
