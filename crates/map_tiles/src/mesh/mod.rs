//! Stitched tile meshes.
//!
//! Every tile is drawn with the same 5x5 vertex grid. Where an edge borders
//! a coarser tile, the odd vertices along that edge are welded onto the even
//! vertex before them, so the edge only uses positions the coarser neighbour
//! also has. This removes T-junction cracks without per-frame geometry work.
//!
//! ```text
//!  mask = UP                 mask = UP | LEFT
//!
//!  0---.---2---.---4         0---.---2---.---4
//!  |  /|  /|  /|  /|         |  /   /|  /   /|
//!  | / | / | / | / |         | /   / | /   / |
//!  5---6---7---8---9         .   6---7---8---9
//!  ...                        ...
//!
//!  '.' = welded vertex, no longer referenced by a visible triangle
//! ```
//!
//! Welding leaves degenerate triangles in the index buffer so all sixteen
//! meshes share one index count.

use glam::Vec2;

use crate::constants::{
  MESH_VARIANT_COUNT, TILE_INDEX_COUNT, TILE_QUAD_RESOLUTION, TILE_VERTEX_COUNT,
  TILE_VERTEX_RESOLUTION,
};
use crate::types::NeighbourMask;

/// One tessellated unit quad.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMesh {
  pub mask: NeighbourMask,
  /// Texture coordinates in `[0, 1]²`; `v = 0` is the north edge.
  pub uvs: [Vec2; TILE_VERTEX_COUNT],
  pub indices: [u16; TILE_INDEX_COUNT],
}

impl TileMesh {
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Index triples, degenerate ones included.
  pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
    self
      .indices
      .chunks_exact(3)
      .map(|t| [t[0], t[1], t[2]])
  }
}

/// Vertex a grid vertex is welded onto for `mask`.
#[inline]
fn weld(mask: NeighbourMask, vertex: usize) -> usize {
  let last = TILE_VERTEX_RESOLUTION - 1;
  let (mut x, mut y) = (vertex % TILE_VERTEX_RESOLUTION, vertex / TILE_VERTEX_RESOLUTION);
  let bits = mask.bits();

  if y == 0 && bits & NeighbourMask::UP != 0 && x % 2 == 1 {
    x -= 1;
  }
  if y == last && bits & NeighbourMask::DOWN != 0 && x % 2 == 1 {
    x -= 1;
  }
  if x == 0 && bits & NeighbourMask::LEFT != 0 && y % 2 == 1 {
    y -= 1;
  }
  if x == last && bits & NeighbourMask::RIGHT != 0 && y % 2 == 1 {
    y -= 1;
  }

  y * TILE_VERTEX_RESOLUTION + x
}

/// Build the mesh for a single neighbour configuration.
pub fn build_tile_mesh(mask: NeighbourMask) -> TileMesh {
  let step = 1.0 / TILE_QUAD_RESOLUTION as f32;
  let uvs = std::array::from_fn(|i| {
    let x = (i % TILE_VERTEX_RESOLUTION) as f32;
    let y = (i / TILE_VERTEX_RESOLUTION) as f32;
    Vec2::new(x * step, y * step)
  });

  let mut indices = [0u16; TILE_INDEX_COUNT];
  let mut cursor = 0;
  let r = TILE_VERTEX_RESOLUTION;
  for row in 0..TILE_QUAD_RESOLUTION {
    for col in 0..TILE_QUAD_RESOLUTION {
      let v = row * r + col;
      for corner in [v + r, v + 1, v, v + r, v + r + 1, v + 1] {
        indices[cursor] = weld(mask, corner) as u16;
        cursor += 1;
      }
    }
  }

  TileMesh { mask, uvs, indices }
}

/// All sixteen stitched meshes, indexed by neighbour mask.
#[derive(Clone, Debug)]
pub struct TileMeshLibrary {
  meshes: [TileMesh; MESH_VARIANT_COUNT],
}

impl TileMeshLibrary {
  pub fn new() -> Self {
    Self {
      meshes: std::array::from_fn(|i| build_tile_mesh(NeighbourMask::from_bits(i as u8))),
    }
  }

  #[inline]
  pub fn get(&self, mask: NeighbourMask) -> &TileMesh {
    &self.meshes[mask.index()]
  }

  pub fn iter(&self) -> impl Iterator<Item = &TileMesh> {
    self.meshes.iter()
  }
}

impl Default for TileMeshLibrary {
  fn default() -> Self {
    Self::new()
  }
}
