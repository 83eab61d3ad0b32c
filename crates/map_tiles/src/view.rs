//! Per-frame view inputs.
//!
//! The quadtree needs more than a camera matrix: it also needs the *view
//! root tile*, the smallest slippy tile that encloses the square of side
//! `2 * far_plane` centred under the camera. Only this tile and its
//! ancestors are forced to subdivide; everything else refines on
//! screen-space error.

use glam::{DMat4, DVec2, DVec3, DVec4, IVec2};

use crate::geo::GeoSpace;
use crate::types::TileKey;

/// Camera state for one frame.
///
/// `projection` follows glam's `perspective_rh` convention (depth in
/// `[0, 1]`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
  pub position: DVec3,
  pub view: DMat4,
  pub projection: DMat4,
  pub far_plane: f64,
}

impl Camera {
  /// Perspective camera at `position` looking at `target`, `z` up.
  pub fn look_at(position: DVec3, target: DVec3, fov_y: f64, aspect: f64, near: f64, far: f64) -> Self {
    let forward = (target - position).normalize_or_zero();
    // Looking straight down makes +z a degenerate up vector.
    let up = if forward.cross(DVec3::Z).length_squared() < 1e-12 {
      DVec3::Y
    } else {
      DVec3::Z
    };
    Self {
      position,
      view: DMat4::look_at_rh(position, target, up),
      projection: DMat4::perspective_rh(fov_y, aspect, near, far),
      far_plane: far,
    }
  }

  #[inline]
  pub fn view_projection(&self) -> DMat4 {
    self.projection * self.view
  }

  /// World-space ray through a point in normalised device coordinates.
  pub fn ray_through(&self, ndc: DVec2) -> Ray {
    let inverse = self.view_projection().inverse();
    let unproject = |depth: f64| {
      let p = inverse * DVec4::new(ndc.x, ndc.y, depth, 1.0);
      p.truncate() / p.w
    };
    let near = unproject(0.0);
    let far = unproject(1.0);
    Ray {
      origin: self.position,
      direction: (far - near).normalize_or_zero(),
    }
  }
}

/// Half-line in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
  pub origin: DVec3,
  pub direction: DVec3,
}

/// Smallest tile enclosing the far-plane square, with its world corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewRoot {
  pub tile: TileKey,
  /// `[nw, ne, sw, se]` at the map height.
  pub corners: [DVec3; 4],
}

/// Find the view root tile, starting from `max_zoom` and coarsening until
/// the four corners of the far-plane square fall into one tile.
pub fn view_root(
  space: &dyn GeoSpace,
  camera_position: DVec3,
  far_plane: f64,
  max_zoom: u8,
  map_height: f64,
) -> ViewRoot {
  let mut zoom = max_zoom;
  let mut tiles: [IVec2; 4] = std::array::from_fn(|i| {
    let dx = if i & 1 == 1 { far_plane } else { -far_plane };
    let dy = if i < 2 { far_plane } else { -far_plane };
    space.local_to_slippy(camera_position + DVec3::new(dx, dy, 0.0), zoom)
  });

  while zoom > 0 && tiles.iter().any(|t| *t != tiles[0]) {
    tiles = tiles.map(|t| IVec2::new(t.x >> 1, t.y >> 1));
    zoom -= 1;
  }

  let tile = TileKey::new(zoom, tiles[0].x, tiles[0].y);
  ViewRoot {
    tile,
    corners: space.tile_corners(tile, map_height),
  }
}

/// Where a ray meets the map plane `z = map_height`, if closer than the far
/// plane.
pub fn pick_map_plane(ray: &Ray, map_height: f64, far_plane: f64) -> Option<DVec3> {
  if ray.direction.z.abs() < 1e-12 {
    return None;
  }
  let t = (map_height - ray.origin.z) / ray.direction.z;
  if t < 0.0 {
    return None;
  }
  let hit = ray.origin + ray.direction * t;
  (hit.distance(ray.origin) < far_plane).then_some(hit)
}

/// Everything the quadtree and renderer need for one update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameView {
  /// Seconds since the previous update.
  pub delta_time: f64,
  pub camera_position: DVec3,
  pub view_projection: DMat4,
  pub far_plane: f64,
  pub view_tile: TileKey,
  pub view_corners: [DVec3; 4],
}

impl FrameView {
  pub fn new(
    space: &dyn GeoSpace,
    camera: &Camera,
    max_zoom: u8,
    map_height: f64,
    delta_time: f64,
  ) -> Self {
    let root = view_root(space, camera.position, camera.far_plane, max_zoom, map_height);
    Self {
      delta_time,
      camera_position: camera.position,
      view_projection: camera.view_projection(),
      far_plane: camera.far_plane,
      view_tile: root.tile,
      view_corners: root.corners,
    }
  }

  /// Axis-aligned `(min, max)` of the view root rectangle.
  pub fn view_rect(&self) -> (DVec2, DVec2) {
    rect_of(&self.view_corners)
  }
}

/// Axis-aligned `(min, max)` of `[nw, ne, sw, se]` corners.
#[inline]
pub fn rect_of(corners: &[DVec3; 4]) -> (DVec2, DVec2) {
  let [nw, ne, sw, se] = corners;
  (DVec2::new(nw.x, sw.y), DVec2::new(se.x, ne.y))
}

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;
