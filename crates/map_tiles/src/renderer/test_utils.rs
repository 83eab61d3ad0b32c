//! Test utilities for renderer tests.
//!
//! Provides a recording backend and in-memory tile sources.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::DVec3;
use web_time::Instant;

use super::backend::{PassDescriptor, RenderBackend, TileDraw};
use crate::error::{BackendError, FetchError};
use crate::fetch::TileSource;
use crate::geo::{GeoSpace, WebMercatorSpace};
use crate::mesh::TileMesh;
use crate::types::{MeshHandle, TextureHandle, TileImage, TileKey};
use crate::view::Camera;

// =============================================================================
// Recording backend
// =============================================================================

/// Backend that remembers every resource and draw.
#[derive(Default)]
pub struct RecordingBackend {
  next_handle: u64,
  /// Live textures and the tile they were created for.
  pub textures: HashMap<TextureHandle, (TileKey, u32, u32)>,
  pub meshes: HashMap<MeshHandle, TileMesh>,
  pub textures_created: usize,
  pub textures_destroyed: usize,
  pub passes: Vec<PassDescriptor>,
  /// `(pass index, draw)`.
  pub draws: Vec<(usize, TileDraw)>,
  pub fail_uploads: bool,
  pass_open: bool,
}

impl RecordingBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn handle(&mut self) -> u64 {
    self.next_handle += 1;
    self.next_handle
  }

  pub fn clear_frame(&mut self) {
    self.passes.clear();
    self.draws.clear();
  }

  /// Draws issued in pass `index`.
  pub fn pass_draws(&self, index: usize) -> impl Iterator<Item = &TileDraw> {
    self.draws.iter().filter(move |(pass, _)| *pass == index).map(|(_, d)| d)
  }
}

impl RenderBackend for RecordingBackend {
  fn create_texture(&mut self, key: TileKey, image: &TileImage) -> Result<TextureHandle, BackendError> {
    if self.fail_uploads {
      return Err(BackendError::Texture("upload disabled".into()));
    }
    let handle = TextureHandle(self.handle());
    self.textures.insert(handle, (key, image.width, image.height));
    self.textures_created += 1;
    Ok(handle)
  }

  fn destroy_texture(&mut self, texture: TextureHandle) {
    assert!(self.textures.remove(&texture).is_some(), "double free of {:?}", texture);
    self.textures_destroyed += 1;
  }

  fn create_mesh(&mut self, mesh: &TileMesh) -> Result<MeshHandle, BackendError> {
    let handle = MeshHandle(self.handle());
    self.meshes.insert(handle, mesh.clone());
    Ok(handle)
  }

  fn destroy_mesh(&mut self, mesh: MeshHandle) {
    assert!(self.meshes.remove(&mesh).is_some(), "double free of {:?}", mesh);
  }

  fn begin_pass(&mut self, pass: &PassDescriptor) {
    assert!(!self.pass_open, "nested pass");
    self.pass_open = true;
    self.passes.push(*pass);
  }

  fn draw_tile(&mut self, draw: &TileDraw) {
    assert!(self.pass_open, "draw outside a pass");
    assert!(self.textures.contains_key(&draw.texture), "draw with dead texture");
    assert!(self.meshes.contains_key(&draw.mesh), "draw with dead mesh");
    self.draws.push((self.passes.len() - 1, draw.clone()));
  }

  fn end_pass(&mut self) {
    assert!(self.pass_open, "end without begin");
    self.pass_open = false;
  }
}

// =============================================================================
// Tile sources
// =============================================================================

/// Serves a small PNG for every tile, or only for listed tiles.
pub struct PngSource {
  pub calls: AtomicUsize,
  only: Option<Vec<TileKey>>,
}

impl PngSource {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      calls: AtomicUsize::new(0),
      only: None,
    })
  }

  /// Other tiles answer 404.
  pub fn only(keys: Vec<TileKey>) -> Arc<Self> {
    Arc::new(Self {
      calls: AtomicUsize::new(0),
      only: Some(keys),
    })
  }
}

impl TileSource for PngSource {
  fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match &self.only {
      Some(keys) if !keys.contains(key) => Err(FetchError::Status(404)),
      _ => Ok(png_bytes(2, 2)),
    }
  }
}

/// Always answers with a server error.
pub struct FailingSource;

impl TileSource for FailingSource {
  fn fetch(&self, _key: &TileKey) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Status(500))
  }
}

/// Blocks every fetch until the gate sender is dropped, then fails.
pub struct GatedSource {
  pub gate: Receiver<()>,
}

impl TileSource for GatedSource {
  fn fetch(&self, _key: &TileKey) -> Result<Vec<u8>, FetchError> {
    let _ = self.gate.recv_timeout(Duration::from_secs(10));
    Err(FetchError::Status(503))
  }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 80, 120, 255]));
  let mut bytes = Vec::new();
  image::DynamicImage::ImageRgba8(image)
    .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
    .unwrap();
  bytes
}

// =============================================================================
// Scene fixtures
// =============================================================================

pub const VIEW_TILE: TileKey = TileKey::new(10, 512, 340);

pub fn space() -> Arc<WebMercatorSpace> {
  Arc::new(WebMercatorSpace::centred_on_tile(VIEW_TILE))
}

/// Camera `height` metres above the centre of `key`, looking down.
pub fn camera_over(space: &dyn GeoSpace, key: TileKey, height: f64) -> Camera {
  let [nw, _, _, se] = space.tile_corners(key, 0.0);
  let centre = (nw + se) * 0.5;
  Camera::look_at(
    centre + DVec3::Z * height,
    centre,
    60f64.to_radians(),
    1.0,
    1.0,
    1000.0,
  )
}

/// Poll `condition` for up to five seconds.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + Duration::from_secs(5);
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    std::thread::sleep(Duration::from_millis(5));
  }
  condition()
}
