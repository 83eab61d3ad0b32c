//! Fixed sizes shared by the quadtree, mesh library and fetch workers.

use std::time::Duration;

/// Vertices along one edge of a tile mesh.
pub const TILE_VERTEX_RESOLUTION: usize = 5;

/// Quads along one edge of a tile mesh.
pub const TILE_QUAD_RESOLUTION: usize = TILE_VERTEX_RESOLUTION - 1;

/// Vertices per tile mesh (5x5 grid).
pub const TILE_VERTEX_COUNT: usize = TILE_VERTEX_RESOLUTION * TILE_VERTEX_RESOLUTION;

/// Indices per tile mesh: two triangles per quad.
pub const TILE_INDEX_COUNT: usize = TILE_QUAD_RESOLUTION * TILE_QUAD_RESOLUTION * 6;

/// One mesh per neighbour mask value.
pub const MESH_VARIANT_COUNT: usize = 16;

/// Number of sample positions passed to the tile shader (3x3 grid).
pub const TILE_SAMPLE_COUNT: usize = 9;

/// Maximum number of elevation tiles bound to a single draw.
pub const MAX_ELEVATION_TILES: usize = 2;

/// Deepest zoom level a slippy tile key may address.
pub const MAX_SLIPPY_ZOOM: u8 = 24;

/// Children per quadtree node, always allocated as one contiguous block.
pub const CHILDREN_PER_NODE: usize = 4;

/// How long an idle fetch worker sleeps before re-checking the running flag.
pub const WORKER_WAKE_TIMEOUT: Duration = Duration::from_millis(1000);

/// RGBA of the 1x1 texture drawn where no imagery is available.
pub const PLACEHOLDER_PIXEL: [u8; 4] = [0xf3, 0xf3, 0xf3, 0xff];
