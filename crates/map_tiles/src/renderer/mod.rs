//! Tile renderer: ties the quadtree, the fetch cache and a graphics backend
//! together.
//!
//! # Frame
//!
//! ```text
//! update(backend, view)
//!   quadtree.update -> quadtree.prune -> destroy released textures
//!   queue refresh (work-list locked):
//!     upload Downloaded slots of touched nodes -> Loaded
//!     request leaves (and the root) still missing imagery
//!     drop entries nobody asked for
//! render(backend, view, projection)
//!   pass 0: textured, blend state per BlendMode
//!   pass 1: wireframe (optional)
//! ```
//!
//! Areas whose imagery is missing are drawn with the nearest loaded
//! ancestor's texture (a sub-rectangle of it) or the grey placeholder.

pub mod backend;
pub mod draw;
pub mod elevation;

#[cfg(test)]
pub mod test_utils;

pub use backend::{
  BlendState, DepthCompare, NullBackend, PassDescriptor, RenderBackend, StencilCompare, StencilOp,
  StencilState, TileConstants, TileDraw,
};
pub use elevation::{ElevationSource, ElevationTile, ElevationTiles, NoElevation};

use std::sync::Arc;

use glam::{DMat4, DVec3, Mat4, Vec4};
use tracing::{debug, warn};
use web_time::Instant;

use crate::constants::{MAX_ELEVATION_TILES, MESH_VARIANT_COUNT, PLACEHOLDER_PIXEL};
use crate::error::TileError;
use crate::fetch::{tile_source_for, FetchConfig, TileFetchCache, TileSource};
use crate::geo::GeoSpace;
use crate::mesh::TileMeshLibrary;
use crate::metrics::TileMetrics;
use crate::quadtree::{NodeId, Quadtree, QuadtreeConfig, QuadtreeNode, ROOT_NODE};
use crate::settings::TileSettings;
use crate::types::{LoadStatus, MeshHandle, TextureHandle, TileImage, TileKey};
use crate::view::{Camera, FrameView};

/// A tile area chosen for drawing, before constants are built.
#[derive(Clone, Copy, Debug)]
struct PlannedDraw {
  node: NodeId,
  texture: TextureHandle,
  uv_offset_scale: Vec4,
  /// Imagery comes from an ancestor or the placeholder.
  fallback: bool,
}

/// Streams and draws slippy-map tiles.
pub struct TileRenderer {
  settings: TileSettings,
  space: Arc<dyn GeoSpace>,
  quadtree: Quadtree,
  cache: TileFetchCache,
  meshes: [MeshHandle; MESH_VARIANT_COUNT],
  placeholder: TextureHandle,
  elevation: Box<dyn ElevationSource>,
  camera_position: DVec3,
  metrics: TileMetrics,
}

impl TileRenderer {
  /// Build a renderer fetching from the server named in `settings`.
  pub fn new(
    settings: TileSettings,
    space: Arc<dyn GeoSpace>,
    backend: &mut dyn RenderBackend,
  ) -> Result<Self, TileError> {
    settings.validate()?;
    let source = tile_source_for(&settings)?;
    Self::with_source(settings, space, source, backend)
  }

  /// Build a renderer over an explicit tile source.
  pub fn with_source(
    settings: TileSettings,
    space: Arc<dyn GeoSpace>,
    source: Arc<dyn TileSource>,
    backend: &mut dyn RenderBackend,
  ) -> Result<Self, TileError> {
    settings.validate()?;
    let cache = TileFetchCache::start(
      source,
      FetchConfig {
        worker_count: settings.worker_count,
        max_attempts: settings.max_attempts,
      },
    )?;

    let meshes = upload_meshes(backend)?;
    let placeholder = match backend.create_texture(TileKey::ROOT, &TileImage::solid(1, 1, PLACEHOLDER_PIXEL)) {
      Ok(texture) => texture,
      Err(err) => {
        meshes.iter().for_each(|&mesh| backend.destroy_mesh(mesh));
        return Err(err.into());
      }
    };

    debug!(server = %settings.tile_server_address, "tile renderer created");
    Ok(Self {
      quadtree: Quadtree::new(QuadtreeConfig::from(&settings), Arc::clone(&space)),
      settings,
      space,
      cache,
      meshes,
      placeholder,
      elevation: Box::new(NoElevation),
      camera_position: DVec3::ZERO,
      metrics: TileMetrics::new(),
    })
  }

  pub fn settings(&self) -> &TileSettings {
    &self.settings
  }

  pub fn quadtree(&self) -> &Quadtree {
    &self.quadtree
  }

  pub fn metrics(&self) -> &TileMetrics {
    &self.metrics
  }

  pub fn placeholder(&self) -> TextureHandle {
    self.placeholder
  }

  /// True while any tile is queued or being fetched.
  pub fn is_loading(&self) -> bool {
    self.cache.queue_len() > 0 || self.cache.in_flight() > 0
  }

  /// Frame inputs for `camera` under the current settings.
  pub fn frame_view(&self, camera: &Camera, delta_time: f64) -> FrameView {
    FrameView::new(
      self.space.as_ref(),
      camera,
      self.settings.max_zoom,
      self.settings.map_height,
      delta_time,
    )
  }

  pub fn set_elevation_source(&mut self, source: Box<dyn ElevationSource>) {
    self.elevation = source;
  }

  // ===========================================================================
  // Update
  // ===========================================================================

  /// Select this frame's tiles, upload finished downloads and refresh the
  /// fetch queue.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "tiles::update"))]
  pub fn update(&mut self, backend: &mut dyn RenderBackend, view: &FrameView) {
    let start = Instant::now();

    self.quadtree.update(view);
    self.quadtree.prune();
    self.destroy_released(backend);
    self.camera_position = view.camera_position;
    self.update_texture_queues(backend);

    self.metrics.record_update(
      self.quadtree.stats(),
      start.elapsed().as_micros() as u64,
      view.delta_time,
    );
    self.metrics.record_queue(
      self.cache.queue_len(),
      self.cache.in_flight(),
      self.cache.stats(),
    );
  }

  fn destroy_released(&mut self, backend: &mut dyn RenderBackend) {
    let released = self.quadtree.drain_released();
    self.metrics.record_released(released.len());
    for texture in released {
      backend.destroy_texture(texture);
    }
  }

  fn update_texture_queues(&mut self, backend: &mut dyn RenderBackend) {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("update_texture_queues").entered();

    let mut sync = self.cache.begin_sync();

    let touched: Vec<NodeId> = self.quadtree.touched().collect();
    for &id in &touched {
      let node = self.quadtree.node_mut(id);
      if node.render.slot.status() == LoadStatus::Downloaded && node.render.slot.touched() {
        upload(backend, node, &mut self.metrics);
      }
    }

    let mut wanted = self.quadtree.leaves();
    if !self.quadtree.is_leaf(ROOT_NODE) {
      wanted.push(ROOT_NODE);
    }
    for id in wanted {
      let node = self.quadtree.node(id);
      let slot = &node.render.slot;
      if node.has_texture() || matches!(slot.status(), LoadStatus::Loaded | LoadStatus::Failed) {
        continue;
      }
      if self.settings.only_request_visible_tiles && !node.visible && !slot.is_root() {
        continue;
      }
      slot.set_priority(
        node.visible,
        node.rendered,
        node.center3().distance_squared(self.camera_position),
      );
      sync.request(slot);
    }

    let queued = sync.queued();
    let dropped = sync.finish();
    if queued > 0 || dropped > 0 {
      debug!(queued, dropped, "tile queue refreshed");
    }
  }

  // ===========================================================================
  // Render
  // ===========================================================================

  /// Draw the current tile set.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "tiles::render"))]
  pub fn render(&mut self, backend: &mut dyn RenderBackend, view: &DMat4, projection: &DMat4) {
    for id in self.quadtree.touched().collect::<Vec<_>>() {
      self.quadtree.node_mut(id).rendered = false;
    }

    let mut planned = Vec::new();
    if !self.plan(ROOT_NODE, &mut planned) {
      planned.push(PlannedDraw {
        node: ROOT_NODE,
        texture: self.placeholder,
        uv_offset_scale: draw::FULL_UV,
        fallback: true,
      });
    }

    let view_with_map = *view * DMat4::from_translation(DVec3::new(0.0, 0.0, self.settings.map_height));
    let projection = projection.as_mat4();
    let colour = Vec4::new(1.0, 1.0, 1.0, 1.0 - self.settings.transparency);
    let mut draws: Vec<TileDraw> = planned
      .iter()
      .map(|plan| self.build_draw(plan, &view_with_map, projection, colour))
      .collect();

    backend.begin_pass(&PassDescriptor::textured(self.settings.blend_mode));
    for draw in &draws {
      backend.draw_tile(draw);
    }
    backend.end_pass();

    if self.settings.show_wireframe {
      backend.begin_pass(&PassDescriptor::wireframe());
      for draw in &mut draws {
        draw.constants.colour = Vec4::ONE;
        backend.draw_tile(draw);
      }
      backend.end_pass();
    }

    for plan in &planned {
      if plan.texture != self.placeholder {
        self.quadtree.node_mut(plan.node).rendered = true;
      }
    }
    self.propagate_rendered();

    let fallback = planned.iter().filter(|p| p.fallback).count() as u32;
    self.metrics.record_draws(planned.len() as u32, fallback);
  }

  /// Choose draws for the subtree at `id`. Returns false when nothing in it
  /// could be drawn and the caller has to cover its area.
  fn plan(&self, id: NodeId, out: &mut Vec<PlannedDraw>) -> bool {
    let node = self.quadtree.node(id);
    if !node.touched {
      return false;
    }

    let children = match self.quadtree.children(id) {
      Some(children) if !self.quadtree.is_leaf(id) => children,
      _ => {
        if !node.visible {
          return true;
        }
        return match node.render.texture {
          Some(texture) => {
            out.push(own_draw(id, texture));
            true
          }
          None => false,
        };
      }
    };

    let drawn = children.map(|child| self.plan(child, out));
    if drawn.iter().all(|&ok| ok) {
      return true;
    }
    if drawn.iter().all(|&ok| !ok) {
      return match node.render.texture {
        Some(texture) => {
          out.push(own_draw(id, texture));
          true
        }
        None => false,
      };
    }

    for (child, ok) in children.into_iter().zip(drawn) {
      if !ok {
        out.push(self.fallback_draw(child));
      }
    }
    true
  }

  /// Cover `id` with the nearest loaded ancestor, or the placeholder.
  fn fallback_draw(&self, id: NodeId) -> PlannedDraw {
    let key = self.quadtree.node(id).key;
    let mut cursor = self.quadtree.node(id).parent;
    while let Some(ancestor) = cursor {
      let node = self.quadtree.node(ancestor);
      if let Some(texture) = node.render.texture {
        return PlannedDraw {
          node: id,
          texture,
          uv_offset_scale: draw::ancestor_uv(key, node.key),
          fallback: true,
        };
      }
      cursor = node.parent;
    }
    PlannedDraw {
      node: id,
      texture: self.placeholder,
      uv_offset_scale: draw::FULL_UV,
      fallback: true,
    }
  }

  fn build_draw(&self, plan: &PlannedDraw, view: &DMat4, projection: Mat4, colour: Vec4) -> TileDraw {
    let node = self.quadtree.node(plan.node);
    let samples = draw::sample_points(self.space.as_ref(), node.key, self.settings.map_height);
    let (min, max) = node.rect();
    let elevation = self.elevation.tiles_for(node.key, min, max);

    TileDraw {
      key: node.key,
      mesh: self.meshes[node.neighbours.index()],
      texture: plan.texture,
      constants: TileConstants {
        projection,
        eye_positions: draw::eye_positions(view, &samples),
        colour,
        uv_offset_scale: plan.uv_offset_scale,
        elevation_uvs: elevation::elevation_uvs(&elevation, &samples),
      },
      elevation: elevation
        .iter()
        .take(MAX_ELEVATION_TILES)
        .map(|tile| tile.texture)
        .collect(),
    }
  }

  /// Descendants of a drawn node count as rendered; publish to the slots.
  fn propagate_rendered(&mut self) {
    let mut stack = vec![(ROOT_NODE, false)];
    while let Some((id, inherited)) = stack.pop() {
      let rendered = {
        let node = self.quadtree.node_mut(id);
        node.rendered |= inherited;
        node.render.slot.set_rendered(node.rendered);
        node.rendered
      };
      if let Some(children) = self.quadtree.children(id) {
        for child in children {
          if self.quadtree.node(child).touched {
            stack.push((child, rendered));
          }
        }
      }
    }
  }

  // ===========================================================================
  // Lifecycle
  // ===========================================================================

  /// Drop every tile and pending request.
  pub fn clear_tiles(&mut self, backend: &mut dyn RenderBackend) {
    self.quadtree.reset();
    self.cache.clear();
    self.destroy_released(backend);
  }

  /// Move the local origin; every tile is dropped.
  pub fn set_space(&mut self, backend: &mut dyn RenderBackend, space: Arc<dyn GeoSpace>) {
    self.space = Arc::clone(&space);
    self.quadtree.set_space(space);
    self.cache.clear();
    self.destroy_released(backend);
  }

  /// Apply new settings. A different server drops every tile; a different
  /// zoom limit, map height or pool size rebuilds the quadtree. Worker count
  /// and retry limit only apply to a newly created renderer.
  pub fn set_settings(&mut self, backend: &mut dyn RenderBackend, settings: TileSettings) -> Result<(), TileError> {
    settings.validate()?;

    if self.settings.source_changed(&settings) {
      let source = tile_source_for(&settings)?;
      self.cache.set_source(source);
      self.clear_tiles(backend);
    }

    let config = QuadtreeConfig::from(&settings);
    if self.settings.layout_changed(&settings) {
      self.quadtree.set_config(config);
      self.cache.clear();
      self.destroy_released(backend);
    } else {
      self.quadtree.retune(config);
    }

    self.settings = settings;
    Ok(())
  }

  /// Stop the workers and release every backend resource.
  pub fn destroy(mut self, backend: &mut dyn RenderBackend) {
    self.cache.shutdown();
    self.quadtree.reset();
    self.destroy_released(backend);
    for mesh in self.meshes {
      backend.destroy_mesh(mesh);
    }
    backend.destroy_texture(self.placeholder);
    debug!("tile renderer destroyed");
  }
}

fn own_draw(node: NodeId, texture: TextureHandle) -> PlannedDraw {
  PlannedDraw {
    node,
    texture,
    uv_offset_scale: draw::FULL_UV,
    fallback: false,
  }
}

/// Move a downloaded image to the backend and mark the slot loaded.
fn upload(backend: &mut dyn RenderBackend, node: &mut QuadtreeNode, metrics: &mut TileMetrics) {
  let slot = Arc::clone(&node.render.slot);
  let Some(image) = slot.take_image() else {
    slot.set_status(LoadStatus::None);
    return;
  };

  match backend.create_texture(node.key, &image) {
    Ok(texture) => {
      node.render.texture = Some(texture);
      node.render.width = image.width;
      node.render.height = image.height;
      slot.set_status(LoadStatus::Loaded);
      metrics.record_upload(true);
    }
    Err(err) => {
      warn!(key = %node.key, %err, "tile texture upload failed");
      slot.set_status(LoadStatus::Failed);
      metrics.record_upload(false);
    }
  }
}

/// Upload all sixteen stitched meshes, indexed by neighbour mask.
fn upload_meshes(backend: &mut dyn RenderBackend) -> Result<[MeshHandle; MESH_VARIANT_COUNT], TileError> {
  let library = TileMeshLibrary::new();
  let mut handles = [MeshHandle(0); MESH_VARIANT_COUNT];
  for (index, mesh) in library.iter().enumerate() {
    match backend.create_mesh(mesh) {
      Ok(handle) => handles[index] = handle,
      Err(err) => {
        handles[..index].iter().for_each(|&h| backend.destroy_mesh(h));
        return Err(err.into());
      }
    }
  }
  Ok(handles)
}
