//! Quadtree node storage.

use std::sync::Arc;

use glam::{DVec2, DVec3};

use crate::fetch::TileSlot;
use crate::types::{NeighbourMask, TextureHandle, TileKey};
use crate::view::rect_of;

/// Index into the quadtree node pool.
pub type NodeId = u32;

/// The root always occupies the first pool entry.
pub const ROOT_NODE: NodeId = 0;

/// Imagery owned by a node.
#[derive(Debug)]
pub struct RenderInfo {
  /// Load state shared with the fetch workers. Replaced with the node.
  pub slot: Arc<TileSlot>,
  pub texture: Option<TextureHandle>,
  pub width: u32,
  pub height: u32,
}

/// One tile in the quadtree.
#[derive(Debug)]
pub struct QuadtreeNode {
  pub key: TileKey,
  pub parent: Option<NodeId>,
  /// First of four contiguous children.
  pub children: Option<NodeId>,
  /// `[nw, ne, sw, se]` at the map height.
  pub corners: [DVec3; 4],
  pub center: DVec2,
  pub visible: bool,
  pub touched: bool,
  pub rendered: bool,
  pub neighbours: NeighbourMask,
  pub render: RenderInfo,
  pub(crate) live: bool,
}

impl QuadtreeNode {
  pub(crate) fn new(key: TileKey, parent: Option<NodeId>, corners: [DVec3; 4]) -> Self {
    let (min, max) = rect_of(&corners);
    Self {
      key,
      parent,
      children: None,
      corners,
      center: (min + max) * 0.5,
      visible: false,
      touched: false,
      rendered: false,
      neighbours: NeighbourMask::NONE,
      render: RenderInfo {
        slot: Arc::new(TileSlot::new(key)),
        texture: None,
        width: 0,
        height: 0,
      },
      live: true,
    }
  }

  /// Axis-aligned `(min, max)` footprint.
  #[inline]
  pub fn rect(&self) -> (DVec2, DVec2) {
    rect_of(&self.corners)
  }

  /// Centre at the map height.
  #[inline]
  pub fn center3(&self) -> DVec3 {
    self.center.extend(self.corners[0].z)
  }

  #[inline]
  pub fn has_texture(&self) -> bool {
    self.render.texture.is_some()
  }
}
