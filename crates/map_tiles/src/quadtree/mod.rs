//! Slippy tile quadtree with per-frame LOD selection.
//!
//! Nodes live in a pool indexed by [`NodeId`]. Children are always allocated
//! as one block of four contiguous entries; freed blocks go on a free-list
//! and are reused before the pool grows.
//!
//! # Frame protocol
//!
//! ```text
//! update(view)
//!   1. clear touched/visible on every live node
//!   2. refine from the root: touch, test visibility, subdivide when
//!      zoom < max_zoom and (ancestor of view tile | visible and too large)
//!   3. 2:1 balance: split leaves two or more levels coarser than an
//!      edge neighbour
//!   4. neighbour masks for every touched node
//! prune()
//!   reclaim child blocks that were not touched this frame
//! ```
//!
//! Untouched subtrees survive `update` so a renderer could still inspect
//! them; `prune` is what releases their textures and detaches their load
//! slots.

mod config;
mod node;
pub mod visibility;

pub use config::QuadtreeConfig;
pub use node::{NodeId, QuadtreeNode, RenderInfo, ROOT_NODE};

use std::sync::Arc;

use tracing::error;

use crate::constants::{CHILDREN_PER_NODE, MAX_SLIPPY_ZOOM};
use crate::geo::GeoSpace;
use crate::types::{Edge, NeighbourMask, TextureHandle, TileKey};
use crate::view::FrameView;

/// Per-update counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadtreeStats {
  pub live_nodes: usize,
  pub touched_nodes: usize,
  pub leaves: usize,
  pub visible_leaves: usize,
  pub deepest_zoom: u8,
  pub balance_splits: usize,
  pub pool_exhausted: bool,
  /// Touched nodes per zoom level.
  pub nodes_per_zoom: [u32; MAX_SLIPPY_ZOOM as usize + 1],
}

/// Pool-backed quadtree over slippy tiles.
pub struct Quadtree {
  config: QuadtreeConfig,
  space: Arc<dyn GeoSpace>,
  nodes: Vec<QuadtreeNode>,
  free_blocks: Vec<NodeId>,
  released: Vec<TextureHandle>,
  live: usize,
  stats: QuadtreeStats,
}

impl Quadtree {
  pub fn new(config: QuadtreeConfig, space: Arc<dyn GeoSpace>) -> Self {
    let mut tree = Self {
      config,
      space,
      nodes: Vec::new(),
      free_blocks: Vec::new(),
      released: Vec::new(),
      live: 0,
      stats: QuadtreeStats::default(),
    };
    tree.install_root();
    tree
  }

  fn install_root(&mut self) {
    let corners = self.space.tile_corners(TileKey::ROOT, self.config.map_height);
    let mut root = QuadtreeNode::new(TileKey::ROOT, None, corners);
    root.touched = true;
    self.nodes.clear();
    self.nodes.push(root);
    self.free_blocks.clear();
    self.live = 1;
  }

  pub fn config(&self) -> &QuadtreeConfig {
    &self.config
  }

  pub fn space(&self) -> &Arc<dyn GeoSpace> {
    &self.space
  }

  /// Swap the geospatial transform; the tree is reset.
  pub fn set_space(&mut self, space: Arc<dyn GeoSpace>) {
    self.space = space;
    self.reset();
  }

  /// Swap the configuration; the tree is reset.
  pub fn set_config(&mut self, config: QuadtreeConfig) {
    self.config = config;
    self.reset();
  }

  /// Change refinement thresholds only. Node geometry (zoom limit, map
  /// height, pool size) must match the current configuration.
  pub fn retune(&mut self, config: QuadtreeConfig) {
    debug_assert_eq!(config.max_zoom, self.config.max_zoom);
    debug_assert_eq!(config.map_height, self.config.map_height);
    debug_assert_eq!(config.max_nodes, self.config.max_nodes);
    self.config = config;
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  #[inline]
  pub fn root(&self) -> &QuadtreeNode {
    &self.nodes[ROOT_NODE as usize]
  }

  #[inline]
  pub fn node(&self, id: NodeId) -> &QuadtreeNode {
    &self.nodes[id as usize]
  }

  #[inline]
  pub fn node_mut(&mut self, id: NodeId) -> &mut QuadtreeNode {
    &mut self.nodes[id as usize]
  }

  /// Child ids, if the node has a child block.
  pub fn children(&self, id: NodeId) -> Option<[NodeId; 4]> {
    self.node(id).children.map(|first| [first, first + 1, first + 2, first + 3])
  }

  /// True when the node has no children active this frame.
  #[inline]
  pub fn is_leaf(&self, id: NodeId) -> bool {
    match self.node(id).children {
      None => true,
      Some(first) => !self.node(first).touched,
    }
  }

  /// Live nodes, touched or not.
  pub fn len(&self) -> usize {
    self.live
  }

  pub fn is_empty(&self) -> bool {
    self.live == 0
  }

  pub fn stats(&self) -> &QuadtreeStats {
    &self.stats
  }

  /// Node with exactly this key, if it is live.
  pub fn find(&self, key: TileKey) -> Option<NodeId> {
    let mut id = ROOT_NODE;
    loop {
      let node = self.node(id);
      if node.key == key {
        return Some(id);
      }
      if node.key.zoom >= key.zoom {
        return None;
      }
      let next = key.ancestor_at(node.key.zoom + 1)?;
      id = node.children? + next.child_index() as NodeId;
    }
  }

  /// Deepest touched node whose tile contains `key` (stops at `key.zoom`).
  pub fn find_covering(&self, key: TileKey) -> NodeId {
    let mut id = ROOT_NODE;
    loop {
      let node = self.node(id);
      if node.key.zoom >= key.zoom || self.is_leaf(id) {
        return id;
      }
      let (Some(first), Some(next)) = (node.children, key.ancestor_at(node.key.zoom + 1)) else {
        return id;
      };
      id = first + next.child_index() as NodeId;
    }
  }

  /// Touched leaves this frame.
  pub fn leaves(&self) -> Vec<NodeId> {
    (0..self.nodes.len() as NodeId)
      .filter(|&id| {
        let node = self.node(id);
        node.live && node.touched && self.is_leaf(id)
      })
      .collect()
  }

  /// Live nodes touched by the last update.
  pub fn touched(&self) -> impl Iterator<Item = NodeId> + '_ {
    (0..self.nodes.len() as NodeId).filter(|&id| {
      let node = self.node(id);
      node.live && node.touched
    })
  }

  /// Textures released by pruning or reset, for the renderer to destroy.
  pub fn drain_released(&mut self) -> Vec<TextureHandle> {
    std::mem::take(&mut self.released)
  }

  // ===========================================================================
  // Update
  // ===========================================================================

  /// Select the active node set for this frame.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "quadtree::update"))]
  pub fn update(&mut self, view: &FrameView) {
    for node in self.nodes.iter_mut().filter(|n| n.live) {
      node.touched = false;
      node.visible = false;
      node.neighbours = NeighbourMask::NONE;
    }
    self.stats = QuadtreeStats {
      live_nodes: self.live,
      ..Default::default()
    };

    {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("refine").entered();
      self.refine(ROOT_NODE, view);
    }
    {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("balance").entered();
      self.stats.balance_splits = self.enforce_balance(view);
    }
    {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("neighbours").entered();
      self.compute_neighbours();
    }
    self.collect_stats();
  }

  fn wants_split(&self, id: NodeId, view: &FrameView) -> bool {
    let node = self.node(id);
    if node.key.zoom >= self.config.max_zoom {
      return false;
    }
    if node.key.zoom < view.view_tile.zoom && node.key.contains(&view.view_tile) {
      return true;
    }
    node.visible
      && self
        .config
        .ndc_to_px(visibility::projected_extent(&node.corners, &view.view_projection))
        > self.config.refine_threshold_px
  }

  fn refine(&mut self, id: NodeId, view: &FrameView) {
    {
      let node = self.node_mut(id);
      node.touched = true;
      node.visible = visibility::is_visible(&node.corners, view);
    }
    if !self.wants_split(id, view) {
      return;
    }
    let Some(first) = self.ensure_children(id) else {
      return;
    };
    for child in first..first + CHILDREN_PER_NODE as NodeId {
      self.refine(child, view);
    }
  }

  /// Child block of `id`, allocating it if needed.
  fn ensure_children(&mut self, id: NodeId) -> Option<NodeId> {
    if let Some(first) = self.node(id).children {
      return Some(first);
    }

    let parent_key = self.node(id).key;
    let height = self.config.map_height;
    let make = |space: &dyn GeoSpace, index: usize| {
      let key = parent_key.child(index);
      QuadtreeNode::new(key, Some(id), space.tile_corners(key, height))
    };

    let first = match self.free_blocks.pop() {
      Some(first) => {
        for index in 0..CHILDREN_PER_NODE {
          self.nodes[first as usize + index] = make(self.space.as_ref(), index);
        }
        first
      }
      None if self.nodes.len() + CHILDREN_PER_NODE <= self.config.max_nodes => {
        let first = self.nodes.len() as NodeId;
        for index in 0..CHILDREN_PER_NODE {
          let child = make(self.space.as_ref(), index);
          self.nodes.push(child);
        }
        first
      }
      None => {
        if !self.stats.pool_exhausted {
          error!(
            max_nodes = self.config.max_nodes,
            tile = %parent_key,
            "quadtree node pool exhausted"
          );
        }
        self.stats.pool_exhausted = true;
        debug_assert!(!self.config.assert_on_exhaustion, "quadtree node pool exhausted");
        return None;
      }
    };

    self.node_mut(id).children = Some(first);
    self.live += CHILDREN_PER_NODE;
    Some(first)
  }

  /// Split leaves that sit two or more levels above an edge neighbour.
  fn enforce_balance(&mut self, view: &FrameView) -> usize {
    let mut splits = 0;

    for _ in 0..self.config.max_balance_iterations {
      let mut coarse: Vec<NodeId> = Vec::new();
      for leaf in self.leaves() {
        let key = self.node(leaf).key;
        for edge in Edge::ALL {
          let neighbour = key.neighbour(edge);
          if !neighbour.is_valid() {
            continue;
          }
          let cover = self.find_covering(neighbour);
          if self.node(cover).key.zoom + 1 < key.zoom && self.is_leaf(cover) {
            coarse.push(cover);
          }
        }
      }
      coarse.sort_unstable();
      coarse.dedup();
      if coarse.is_empty() {
        break;
      }

      for id in coarse {
        let Some(first) = self.ensure_children(id) else {
          return splits;
        };
        for child in first..first + CHILDREN_PER_NODE as NodeId {
          let node = self.node_mut(child);
          node.touched = true;
          node.visible = visibility::is_visible(&node.corners, view);
        }
        splits += 1;
      }
    }

    splits
  }

  fn compute_neighbours(&mut self) {
    for id in 0..self.nodes.len() as NodeId {
      let node = self.node(id);
      if !node.live || !node.touched {
        continue;
      }
      let key = node.key;
      let mut mask = NeighbourMask::NONE;
      for edge in Edge::ALL {
        let neighbour = key.neighbour(edge);
        if neighbour.is_valid() && self.node(self.find_covering(neighbour)).key.zoom < key.zoom {
          mask.insert(edge);
        }
      }
      self.node_mut(id).neighbours = mask;
    }
  }

  fn collect_stats(&mut self) {
    let mut stats = std::mem::take(&mut self.stats);
    stats.live_nodes = self.live;
    for id in 0..self.nodes.len() as NodeId {
      let node = self.node(id);
      if !node.live || !node.touched {
        continue;
      }
      stats.touched_nodes += 1;
      stats.nodes_per_zoom[node.key.zoom as usize] += 1;
      stats.deepest_zoom = stats.deepest_zoom.max(node.key.zoom);
      if self.is_leaf(id) {
        stats.leaves += 1;
        if node.visible {
          stats.visible_leaves += 1;
        }
      }
    }
    self.stats = stats;
  }

  // ===========================================================================
  // Prune / reset
  // ===========================================================================

  /// Reclaim child blocks not touched by the last update. Returns the number
  /// of nodes released.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "quadtree::prune"))]
  pub fn prune(&mut self) -> usize {
    let mut pruned = 0;
    let mut stack = vec![ROOT_NODE];
    while let Some(id) = stack.pop() {
      let Some(first) = self.node(id).children else {
        continue;
      };
      if self.node(first).touched {
        stack.extend(first..first + CHILDREN_PER_NODE as NodeId);
      } else {
        pruned += self.release_block(first);
        self.node_mut(id).children = None;
      }
    }
    self.stats.live_nodes = self.live;
    pruned
  }

  fn release_block(&mut self, first: NodeId) -> usize {
    let mut released = 0;
    let mut blocks = vec![first];
    while let Some(block) = blocks.pop() {
      for id in block..block + CHILDREN_PER_NODE as NodeId {
        let node = &mut self.nodes[id as usize];
        if let Some(grandchildren) = node.children.take() {
          blocks.push(grandchildren);
        }
        Self::release_node(node, &mut self.released);
        released += 1;
      }
      self.free_blocks.push(block);
      self.live -= CHILDREN_PER_NODE;
    }
    released
  }

  fn release_node(node: &mut QuadtreeNode, released: &mut Vec<TextureHandle>) {
    node.render.slot.detach();
    if let Some(texture) = node.render.texture.take() {
      released.push(texture);
    }
    node.touched = false;
    node.visible = false;
    node.live = false;
  }

  /// Drop back to a single fresh root, releasing every node's resources.
  pub fn reset(&mut self) {
    if let Some(first) = self.nodes[ROOT_NODE as usize].children.take() {
      self.release_block(first);
    }
    let root = &mut self.nodes[ROOT_NODE as usize];
    Self::release_node(root, &mut self.released);
    self.install_root();
    self.stats = QuadtreeStats {
      live_nodes: self.live,
      ..Default::default()
    };
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
