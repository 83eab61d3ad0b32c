use glam::DVec3;

use super::*;
use crate::geo::WebMercatorSpace;
use crate::types::LoadStatus;
use crate::view::Camera;

const VIEW_TILE: TileKey = TileKey::new(10, 512, 340);
const ELSEWHERE: TileKey = TileKey::new(10, 100, 100);

fn space() -> Arc<WebMercatorSpace> {
  Arc::new(WebMercatorSpace::centred_on_tile(VIEW_TILE))
}

fn camera_over(space: &WebMercatorSpace, key: TileKey, height: f64, far: f64) -> Camera {
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

fn frame(space: &WebMercatorSpace, camera: &Camera) -> FrameView {
  FrameView::new(space, camera, 19, 0.0, 1.0 / 60.0)
}

fn frame_over(space: &WebMercatorSpace, key: TileKey) -> FrameView {
  frame(space, &camera_over(space, key, 500.0, 1000.0))
}

fn updated_tree() -> (Quadtree, Arc<WebMercatorSpace>) {
  let space = space();
  let mut tree = Quadtree::new(QuadtreeConfig::default(), space.clone());
  tree.update(&frame_over(&space, VIEW_TILE));
  tree.prune();
  (tree, space)
}

/// Touched leaf under the local origin.
fn camera_leaf(tree: &Quadtree, space: &WebMercatorSpace) -> NodeId {
  let tile = space.local_to_slippy(DVec3::new(1.0, 1.0, 0.0), 19);
  tree.find_covering(TileKey::new(19, tile.x, tile.y))
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_new_tree_is_single_root() {
  let tree = Quadtree::new(QuadtreeConfig::default(), space());
  assert_eq!(tree.len(), 1);
  assert_eq!(tree.root().key, TileKey::ROOT);
  assert!(tree.root().touched);
  assert!(tree.is_leaf(ROOT_NODE));
  assert_eq!(tree.root().render.slot.status(), LoadStatus::None);
}

// =========================================================================
// Update
// =========================================================================

#[test]
fn test_update_reaches_view_tile() {
  let (tree, space) = updated_tree();

  for zoom in 0..=VIEW_TILE.zoom {
    let key = VIEW_TILE.ancestor_at(zoom).unwrap();
    let id = tree.find(key).unwrap_or_else(|| panic!("{} missing", key));
    assert!(tree.node(id).touched, "{} not touched", key);
  }

  let view = tree.find(VIEW_TILE).unwrap();
  assert!(tree.node(view).visible);
  assert!(!tree.is_leaf(view));

  let leaf = camera_leaf(&tree, &space);
  let node = tree.node(leaf);
  assert!(tree.is_leaf(leaf));
  assert!(node.visible);
  assert!(node.key.zoom >= 18, "camera leaf only reached zoom {}", node.key.zoom);
  assert!(VIEW_TILE.contains(&node.key));
}

#[test]
fn test_root_always_touched() {
  let (tree, _) = updated_tree();
  assert!(tree.root().touched);
  assert!(tree.stats().touched_nodes > 1);
  assert_eq!(tree.stats().deepest_zoom, 19);
}

#[test]
fn test_view_tile_ancestors_refine_even_when_invisible() {
  let space = space();
  let mut tree = Quadtree::new(QuadtreeConfig::default(), space.clone());
  let mut camera = camera_over(&space, VIEW_TILE, 500.0, 1000.0);
  // Look straight up, away from the map.
  camera = Camera::look_at(
    camera.position,
    camera.position + DVec3::Z,
    60f64.to_radians(),
    1.0,
    1.0,
    1000.0,
  );
  tree.update(&frame(&space, &camera));

  let view = tree.find(VIEW_TILE).expect("view tile subdivided into");
  assert!(tree.node(view).touched);
  assert!(!tree.node(view).visible);
  assert!(tree.is_leaf(view));
  assert_eq!(tree.stats().visible_leaves, 0);
}

#[test]
fn test_leaves_are_two_to_one_balanced() {
  let (tree, _) = updated_tree();
  for leaf in tree.leaves() {
    let key = tree.node(leaf).key;
    for edge in Edge::ALL {
      let neighbour = key.neighbour(edge);
      if !neighbour.is_valid() {
        continue;
      }
      let cover = tree.node(tree.find_covering(neighbour)).key;
      assert!(
        key.zoom <= cover.zoom + 1,
        "{} borders {} across {:?}",
        key,
        cover,
        edge
      );
    }
  }
}

#[test]
fn test_neighbour_masks_mark_the_finer_side() {
  let (tree, _) = updated_tree();
  let mut stitched = 0;
  for leaf in tree.leaves() {
    let node = tree.node(leaf);
    for edge in Edge::ALL {
      let neighbour = node.key.neighbour(edge);
      if !neighbour.is_valid() {
        assert!(!node.neighbours.contains(edge));
        continue;
      }
      let cover = tree.find_covering(neighbour);
      let coarser = tree.node(cover).key.zoom < node.key.zoom;
      assert_eq!(node.neighbours.contains(edge), coarser, "{} {:?}", node.key, edge);
      if coarser {
        stitched += 1;
        // The coarse side never stitches towards the finer tile.
        let back = tree.node(cover);
        let facing = match edge {
          Edge::Up => Edge::Down,
          Edge::Down => Edge::Up,
          Edge::Left => Edge::Right,
          Edge::Right => Edge::Left,
        };
        assert!(!back.neighbours.contains(facing), "{} stitches back", back.key);
      }
    }
  }
  assert!(stitched > 0, "expected LOD boundaries in a perspective view");
}

// =========================================================================
// Prune
// =========================================================================

#[test]
fn test_untouched_nodes_survive_until_prune() {
  let (mut tree, space) = updated_tree();
  let leaf = camera_leaf(&tree, &space);
  let leaf_key = tree.node(leaf).key;
  let slot = Arc::clone(&tree.node(leaf).render.slot);

  tree.update(&frame_over(&space, ELSEWHERE));
  assert!(!tree.node(leaf).touched);
  assert!(slot.touched(), "slot detaches only on prune");

  let pruned = tree.prune();
  assert!(pruned > 0);
  assert!(!slot.touched());
  assert!(tree.find(leaf_key).is_none());
}

#[test]
fn test_prune_twice_is_noop() {
  let (mut tree, space) = updated_tree();
  tree.update(&frame_over(&space, ELSEWHERE));
  assert!(tree.prune() > 0);
  let live = tree.len();
  assert_eq!(tree.prune(), 0);
  assert_eq!(tree.len(), live);
}

#[test]
fn test_after_prune_every_live_node_is_touched() {
  let (mut tree, space) = updated_tree();
  tree.update(&frame_over(&space, ELSEWHERE));
  tree.prune();
  assert_eq!(tree.len(), tree.stats().touched_nodes);
  assert!(!tree.free_blocks.is_empty());
}

#[test]
fn test_pruned_textures_are_released() {
  let (mut tree, space) = updated_tree();
  let leaf = camera_leaf(&tree, &space);
  tree.node_mut(leaf).render.texture = Some(TextureHandle(42));

  tree.update(&frame_over(&space, ELSEWHERE));
  tree.prune();
  assert_eq!(tree.drain_released(), vec![TextureHandle(42)]);
  assert!(tree.drain_released().is_empty());
}

// =========================================================================
// Reset
// =========================================================================

#[test]
fn test_reset_returns_to_fresh_root() {
  let (mut tree, space) = updated_tree();
  let leaf = camera_leaf(&tree, &space);
  tree.node_mut(leaf).render.texture = Some(TextureHandle(7));
  tree.node_mut(ROOT_NODE).render.texture = Some(TextureHandle(1));
  let old_root_slot = Arc::clone(&tree.root().render.slot);

  tree.reset();

  assert_eq!(tree.len(), 1);
  assert!(tree.is_leaf(ROOT_NODE));
  assert!(tree.root().render.texture.is_none());
  assert!(!old_root_slot.touched());
  assert!(!Arc::ptr_eq(&old_root_slot, &tree.root().render.slot));

  let mut released = tree.drain_released();
  released.sort_by_key(|t| t.0);
  assert_eq!(released, vec![TextureHandle(1), TextureHandle(7)]);
}

#[test]
fn test_set_config_resets_and_applies_height() {
  let (mut tree, _) = updated_tree();
  let config = QuadtreeConfig {
    map_height: 40.0,
    ..QuadtreeConfig::default()
  };
  tree.set_config(config);
  assert_eq!(tree.len(), 1);
  assert!(tree.root().corners.iter().all(|c| c.z == 40.0));
}

// =========================================================================
// Pool limits
// =========================================================================

fn tiny_pool(assert_on_exhaustion: bool) -> QuadtreeConfig {
  QuadtreeConfig {
    max_nodes: 9,
    assert_on_exhaustion,
    ..QuadtreeConfig::default()
  }
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "quadtree node pool exhausted")]
fn test_pool_exhaustion_trips_debug_assert() {
  let space = space();
  let mut tree = Quadtree::new(tiny_pool(true), space.clone());
  tree.update(&frame_over(&space, VIEW_TILE));
}

#[test]
fn test_pool_exhaustion_stops_refinement() {
  let space = space();
  let mut tree = Quadtree::new(tiny_pool(false), space.clone());
  let view = frame_over(&space, VIEW_TILE);
  tree.update(&view);

  assert!(tree.stats().pool_exhausted);
  assert_eq!(tree.len(), 9);
  // Nodes that could not split stay leaves and the tree stays consistent.
  assert!(!tree.leaves().is_empty());
  assert!(tree.touched().all(|id| tree.node(id).key.zoom <= 2));

  tree.prune();
  tree.update(&view);
  assert!(tree.stats().pool_exhausted);
  assert_eq!(tree.len(), 9);
}
