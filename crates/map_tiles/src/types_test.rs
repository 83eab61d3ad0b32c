use super::*;

#[test]
fn test_child_and_parent_are_inverse() {
  let key = TileKey::new(10, 512, 340);
  for index in 0..4 {
    let child = key.child(index);
    assert_eq!(child.zoom, 11);
    assert_eq!(child.parent(), Some(key));
    assert_eq!(child.child_index(), index);
  }
}

#[test]
fn test_root_has_no_parent() {
  assert_eq!(TileKey::ROOT.parent(), None);
  assert!(TileKey::ROOT.is_valid());
}

#[test]
fn test_child_layout_matches_slippy_order() {
  let key = TileKey::new(3, 2, 5);
  assert_eq!(key.child(0), TileKey::new(4, 4, 10));
  assert_eq!(key.child(1), TileKey::new(4, 5, 10));
  assert_eq!(key.child(2), TileKey::new(4, 4, 11));
  assert_eq!(key.child(3), TileKey::new(4, 5, 11));
}

#[test]
fn test_contains_walks_ancestry() {
  let view = TileKey::new(10, 512, 340);
  assert!(TileKey::ROOT.contains(&view));
  assert!(TileKey::new(9, 256, 170).contains(&view));
  assert!(view.contains(&view));
  assert!(!TileKey::new(9, 257, 170).contains(&view));
  assert!(!view.contains(&TileKey::new(9, 256, 170)));
}

#[test]
fn test_validity_bounds() {
  assert!(TileKey::new(2, 3, 3).is_valid());
  assert!(!TileKey::new(2, 4, 0).is_valid());
  assert!(!TileKey::new(2, 0, -1).is_valid());
}

#[test]
fn test_neighbour_offsets() {
  let key = TileKey::new(4, 7, 7);
  assert_eq!(key.neighbour(Edge::Up), TileKey::new(4, 7, 6));
  assert_eq!(key.neighbour(Edge::Right), TileKey::new(4, 8, 7));
  assert_eq!(key.neighbour(Edge::Down), TileKey::new(4, 7, 8));
  assert_eq!(key.neighbour(Edge::Left), TileKey::new(4, 6, 7));
}

#[test]
fn test_mask_bits() {
  let mut mask = NeighbourMask::NONE;
  mask.insert(Edge::Right);
  mask.insert(Edge::Left);
  assert_eq!(mask.bits(), NeighbourMask::RIGHT | NeighbourMask::LEFT);
  assert_eq!(mask.index(), 10);
  assert!(mask.contains(Edge::Left));
  assert!(!mask.contains(Edge::Up));
  assert_eq!(NeighbourMask::from_bits(0xff).bits(), 0xf);
}

#[test]
fn test_load_status_from_u8() {
  for status in [
    LoadStatus::None,
    LoadStatus::InQueue,
    LoadStatus::Downloading,
    LoadStatus::Downloaded,
    LoadStatus::Loaded,
    LoadStatus::Failed,
  ] {
    assert_eq!(LoadStatus::from_u8(status as u8), status);
  }
  assert_eq!(LoadStatus::from_u8(200), LoadStatus::None);
}

#[test]
fn test_solid_image_layout() {
  let image = TileImage::solid(2, 3, [1, 2, 3, 4]);
  assert_eq!(image.pixels.len(), 2 * 3 * 4);
  assert_eq!(&image.pixels[20..24], &[1, 2, 3, 4]);
}
