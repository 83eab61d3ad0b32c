//! Per-node visibility and screen-space error.
//!
//! Clip planes follow the `[0, 1]` depth convention:
//! `-w <= x <= w`, `-w <= y <= w`, `0 <= z <= w`.

use glam::{DMat4, DVec2, DVec3, DVec4};

use crate::view::{rect_of, FrameView};

/// Corners closer to the camera plane than this count as crossing it.
const MIN_CLIP_W: f64 = 1e-6;

/// Combined view-rect, far-plane and frustum test.
pub fn is_visible(corners: &[DVec3; 4], view: &FrameView) -> bool {
  overlaps_rect(corners, view.view_rect())
    && within_far_plane(corners, view.camera_position, view.far_plane)
    && in_frustum(corners, &view.view_projection)
}

/// Strict overlap of the node footprint with `(min, max)`.
pub fn overlaps_rect(corners: &[DVec3; 4], (min, max): (DVec2, DVec2)) -> bool {
  let (node_min, node_max) = rect_of(corners);
  node_min.x < max.x && node_max.x > min.x && node_min.y < max.y && node_max.y > min.y
}

/// True when the nearest point of the footprint lies within `far_plane`.
pub fn within_far_plane(corners: &[DVec3; 4], camera: DVec3, far_plane: f64) -> bool {
  let (min, max) = rect_of(corners);
  let nearest = camera.truncate().clamp(min, max);
  let nearest = nearest.extend(corners[0].z);
  nearest.distance_squared(camera) <= far_plane * far_plane
}

fn clip_corners(corners: &[DVec3; 4], view_projection: &DMat4) -> [DVec4; 4] {
  corners.map(|c| *view_projection * c.extend(1.0))
}

/// Conservative frustum test: culled only if all corners are outside one
/// clip plane.
pub fn in_frustum(corners: &[DVec3; 4], view_projection: &DMat4) -> bool {
  let clip = clip_corners(corners, view_projection);
  let all = |outside: fn(&DVec4) -> bool| clip.iter().all(outside);

  !(all(|p| p.x < -p.w)
    || all(|p| p.x > p.w)
    || all(|p| p.y < -p.w)
    || all(|p| p.y > p.w)
    || all(|p| p.z < 0.0)
    || all(|p| p.z > p.w))
}

/// Largest projected NDC extent; infinite when a corner crosses the camera
/// plane.
pub fn projected_extent(corners: &[DVec3; 4], view_projection: &DMat4) -> f64 {
  let clip = clip_corners(corners, view_projection);
  if clip.iter().any(|p| p.w <= MIN_CLIP_W) {
    return f64::INFINITY;
  }

  let mut min = DVec2::splat(f64::MAX);
  let mut max = DVec2::splat(f64::MIN);
  for p in &clip {
    let ndc = p.truncate().truncate() / p.w;
    min = min.min(ndc);
    max = max.max(ndc);
  }
  let extent = max - min;
  extent.x.max(extent.y)
}

#[cfg(test)]
#[path = "visibility_test.rs"]
mod visibility_test;
