use super::*;
use crate::geo::WebMercatorSpace;

fn downward_camera(space: &WebMercatorSpace, key: TileKey, height: f64, far: f64) -> Camera {
  let [nw, _, _, se] = space.tile_corners(key, 0.0);
  let centre = (nw + se) * 0.5;
  Camera::look_at(
    centre + DVec3::Z * height,
    centre,
    60f64.to_radians(),
    1.0,
    1.0,
    far,
  )
}

#[test]
fn test_view_root_encloses_far_square() {
  let key = TileKey::new(10, 512, 340);
  let space = WebMercatorSpace::centred_on_tile(key);
  let camera = downward_camera(&space, key, 500.0, 1000.0);

  let root = view_root(&space, camera.position, camera.far_plane, 19, 0.0);
  assert_eq!(root.tile, key);

  let (min, max) = rect_of(&root.corners);
  assert!(min.x <= -1000.0 && min.y <= -1000.0);
  assert!(max.x >= 1000.0 && max.y >= 1000.0);
}

#[test]
fn test_view_root_coarsens_across_tile_corner() {
  // The origin sits on the corner shared by four zoom-11 tiles, so only
  // their zoom-10 parent encloses the square.
  let space = WebMercatorSpace::centred_on_tile(TileKey::new(10, 512, 340));
  let root = view_root(&space, DVec3::new(0.0, 0.0, 100.0), 10.0, 18, 0.0);
  assert_eq!(root.tile, TileKey::new(10, 512, 340));
}

#[test]
fn test_view_root_stops_at_max_zoom() {
  let key = TileKey::new(10, 512, 340);
  let space = WebMercatorSpace::centred_on_tile(key);
  // A tiny far plane fits inside a deep tile, but never deeper than max_zoom.
  let root = view_root(&space, DVec3::new(5.0, 5.0, 1.0), 0.5, 12, 0.0);
  assert_eq!(root.tile.zoom, 12);
  assert!(key.contains(&root.tile));
}

#[test]
fn test_view_root_huge_far_plane_is_world() {
  let space = WebMercatorSpace::centred_on_tile(TileKey::new(3, 4, 2));
  let root = view_root(&space, DVec3::ZERO, 1e9, 15, 0.0);
  assert_eq!(root.tile, TileKey::ROOT);
}

#[test]
fn test_frame_view_carries_map_height() {
  let key = TileKey::new(10, 512, 340);
  let space = WebMercatorSpace::centred_on_tile(key);
  let camera = downward_camera(&space, key, 500.0, 1000.0);
  let frame = FrameView::new(&space, &camera, 19, 25.0, 0.016);
  assert!(frame.view_corners.iter().all(|c| c.z == 25.0));
  assert_eq!(frame.view_tile, key);
  assert_eq!(frame.delta_time, 0.016);
}

// =========================================================================
// Picking
// =========================================================================

#[test]
fn test_pick_hits_plane_below() {
  let ray = Ray {
    origin: DVec3::new(3.0, 4.0, 100.0),
    direction: DVec3::new(0.0, 0.0, -1.0),
  };
  let hit = pick_map_plane(&ray, 10.0, 1000.0).unwrap();
  assert_eq!(hit, DVec3::new(3.0, 4.0, 10.0));
}

#[test]
fn test_pick_rejects_parallel_behind_and_distant() {
  let flat = Ray {
    origin: DVec3::new(0.0, 0.0, 100.0),
    direction: DVec3::X,
  };
  assert!(pick_map_plane(&flat, 0.0, 1000.0).is_none());

  let upward = Ray {
    origin: DVec3::new(0.0, 0.0, 100.0),
    direction: DVec3::Z,
  };
  assert!(pick_map_plane(&upward, 0.0, 1000.0).is_none());

  let down = Ray {
    origin: DVec3::new(0.0, 0.0, 2000.0),
    direction: -DVec3::Z,
  };
  assert!(pick_map_plane(&down, 0.0, 1000.0).is_none());
}

#[test]
fn test_centre_ray_of_downward_camera_hits_below() {
  let key = TileKey::new(10, 512, 340);
  let space = WebMercatorSpace::centred_on_tile(key);
  let camera = downward_camera(&space, key, 500.0, 1000.0);
  let ray = camera.ray_through(DVec2::ZERO);
  let hit = pick_map_plane(&ray, 0.0, camera.far_plane).unwrap();
  assert!(hit.truncate().length() < 1e-3, "hit {:?}", hit);
}
