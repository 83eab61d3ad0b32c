//! Graphics backend interface.
//!
//! The renderer never talks to a GPU API directly. It creates textures and
//! meshes through a [`RenderBackend`] and describes each draw with a
//! [`PassDescriptor`] plus one [`TileDraw`] per tile.

use glam::{Mat4, Vec4};
use smallvec::SmallVec;

use crate::constants::{MAX_ELEVATION_TILES, TILE_SAMPLE_COUNT};
use crate::error::BackendError;
use crate::mesh::TileMesh;
use crate::settings::BlendMode;
use crate::types::{MeshHandle, TextureHandle, TileImage, TileKey};

// =============================================================================
// Pass state
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthCompare {
  LessOrEqual,
  Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendState {
  Opaque,
  /// `src * a + dst * (1 - a)`.
  Interpolative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilCompare {
  Equal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilOp {
  Increment,
}

/// Stencil test used so overlapping tiles only touch each pixel once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilState {
  pub compare: StencilCompare,
  pub reference: u8,
  pub read_mask: u8,
  pub write_mask: u8,
  pub pass_op: StencilOp,
}

/// Fixed-function state for one render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassDescriptor {
  pub blend: BlendState,
  pub depth_compare: DepthCompare,
  pub depth_write: bool,
  /// Viewport depth range; `(1, 1)` pins tiles to the far plane.
  pub depth_range: (f32, f32),
  pub stencil: Option<StencilState>,
  /// `(factor, units)`.
  pub polygon_offset: Option<(f32, f32)>,
  pub wireframe: bool,
}

impl PassDescriptor {
  /// Textured tile pass for a blend mode.
  pub fn textured(mode: BlendMode) -> Self {
    let hybrid = Self {
      blend: BlendState::Interpolative,
      depth_compare: DepthCompare::LessOrEqual,
      depth_write: true,
      depth_range: (0.0, 1.0),
      stencil: None,
      polygon_offset: None,
      wireframe: false,
    };
    match mode {
      BlendMode::Hybrid => hybrid,
      BlendMode::Overlay => Self {
        depth_compare: DepthCompare::Always,
        depth_write: false,
        stencil: Some(StencilState {
          compare: StencilCompare::Equal,
          reference: 0,
          read_mask: 0xff,
          write_mask: 0xff,
          pass_op: StencilOp::Increment,
        }),
        ..hybrid
      },
      BlendMode::Underlay => Self {
        depth_range: (1.0, 1.0),
        ..hybrid
      },
    }
  }

  /// Wireframe overlay drawn after the textured pass.
  pub fn wireframe() -> Self {
    Self {
      blend: BlendState::Opaque,
      depth_compare: DepthCompare::LessOrEqual,
      depth_write: true,
      depth_range: (0.0, 1.0),
      stencil: None,
      polygon_offset: Some((1.0, -0.1)),
      wireframe: true,
    }
  }
}

// =============================================================================
// Draws
// =============================================================================

/// Per-draw shader constants.
///
/// Positions are computed on the CPU in double precision and handed over in
/// eye space, so the vertex stage only interpolates between the nine
/// samples using the mesh UVs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileConstants {
  pub projection: Mat4,
  /// 3x3 grid, row-major from the north-west corner.
  pub eye_positions: [Vec4; TILE_SAMPLE_COUNT],
  pub colour: Vec4,
  /// `(u offset, v offset, u scale, v scale)` into the bound texture.
  pub uv_offset_scale: Vec4,
  /// Per sample: `xy` into elevation tile 0, `zw` into elevation tile 1.
  pub elevation_uvs: [Vec4; TILE_SAMPLE_COUNT],
}

/// One tile draw.
#[derive(Clone, Debug, PartialEq)]
pub struct TileDraw {
  pub key: TileKey,
  pub mesh: MeshHandle,
  pub texture: TextureHandle,
  pub constants: TileConstants,
  pub elevation: SmallVec<[TextureHandle; MAX_ELEVATION_TILES]>,
}

// =============================================================================
// Backend
// =============================================================================

/// GPU resource and draw interface.
///
/// All calls come from the render thread.
pub trait RenderBackend {
  /// Upload an RGBA8 image.
  fn create_texture(&mut self, key: TileKey, image: &TileImage) -> Result<TextureHandle, BackendError>;

  fn destroy_texture(&mut self, texture: TextureHandle);

  /// Upload one stitched tile mesh (25 UV vertices, 96 indices).
  fn create_mesh(&mut self, mesh: &TileMesh) -> Result<MeshHandle, BackendError>;

  fn destroy_mesh(&mut self, mesh: MeshHandle);

  fn begin_pass(&mut self, pass: &PassDescriptor);

  fn draw_tile(&mut self, draw: &TileDraw);

  fn end_pass(&mut self);
}

/// Backend that hands out handles and draws nothing, for headless runs.
#[derive(Debug, Default)]
pub struct NullBackend {
  next_handle: u64,
  pub live_textures: usize,
  pub live_meshes: usize,
  pub draws: u64,
}

impl NullBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn handle(&mut self) -> u64 {
    self.next_handle += 1;
    self.next_handle
  }
}

impl RenderBackend for NullBackend {
  fn create_texture(&mut self, _key: TileKey, _image: &TileImage) -> Result<TextureHandle, BackendError> {
    self.live_textures += 1;
    Ok(TextureHandle(self.handle()))
  }

  fn destroy_texture(&mut self, _texture: TextureHandle) {
    self.live_textures = self.live_textures.saturating_sub(1);
  }

  fn create_mesh(&mut self, _mesh: &TileMesh) -> Result<MeshHandle, BackendError> {
    self.live_meshes += 1;
    Ok(MeshHandle(self.handle()))
  }

  fn destroy_mesh(&mut self, _mesh: MeshHandle) {
    self.live_meshes = self.live_meshes.saturating_sub(1);
  }

  fn begin_pass(&mut self, _pass: &PassDescriptor) {}

  fn draw_tile(&mut self, _draw: &TileDraw) {
    self.draws += 1;
  }

  fn end_pass(&mut self) {}
}
