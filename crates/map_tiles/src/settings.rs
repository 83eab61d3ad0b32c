//! Map tile settings.
//!
//! Every field has a default, so a settings file only needs the keys it
//! wants to change:
//!
//! ```toml
//! tile_server_address = "https://tile.openstreetmap.org"
//! tile_server_extension = "png"
//! blend_mode = "overlay"
//! map_height = 12.5
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_SLIPPY_ZOOM;
use crate::error::TileError;

/// How map tiles are composited with the rest of the scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
  /// Depth tested against the scene, blended over it.
  #[default]
  Hybrid,
  /// Drawn on top of everything, once per pixel.
  Overlay,
  /// Pushed to the far plane, behind everything.
  Underlay,
}

/// Settings consumed by [`TileRenderer`](crate::renderer::TileRenderer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSettings {
  /// Server root, `http(s)://` or a local directory / `file://` path.
  pub tile_server_address: String,
  /// Image extension appended to tile paths.
  pub tile_server_extension: String,
  /// Deepest zoom the quadtree refines to.
  pub max_zoom: u8,
  /// Skip download requests for leaves outside the view.
  pub only_request_visible_tiles: bool,
  pub blend_mode: BlendMode,
  /// Height of the map plane in local space.
  pub map_height: f64,
  /// 0 is opaque, 1 is invisible.
  pub transparency: f32,
  /// Draw a wireframe pass over the tiles.
  pub show_wireframe: bool,
  /// Projected size in pixels above which a visible tile is subdivided.
  pub refine_threshold_px: f64,
  /// Reference viewport size used to turn NDC extents into pixels.
  pub screen_reference_px: f64,
  pub worker_count: usize,
  /// Fetch attempts per tile before it is marked failed.
  pub max_attempts: u8,
  pub request_timeout_secs: u64,
  /// Quadtree node pool capacity, including the root.
  pub max_nodes: usize,
  /// Upper bound on 2:1 balance passes per update.
  pub max_balance_iterations: usize,
  pub user_agent: String,
}

impl Default for TileSettings {
  fn default() -> Self {
    Self {
      tile_server_address: "https://tile.openstreetmap.org".to_string(),
      tile_server_extension: "png".to_string(),
      max_zoom: 19,
      only_request_visible_tiles: true,
      blend_mode: BlendMode::Hybrid,
      map_height: 0.0,
      transparency: 0.0,
      show_wireframe: false,
      refine_threshold_px: 256.0,
      screen_reference_px: 1024.0,
      worker_count: 4,
      max_attempts: 3,
      request_timeout_secs: 10,
      max_nodes: 16385,
      max_balance_iterations: MAX_SLIPPY_ZOOM as usize + 1,
      user_agent: concat!("map_tiles/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

impl TileSettings {
  /// Parse and validate settings from TOML text.
  pub fn from_toml_str(text: &str) -> Result<Self, TileError> {
    let settings: TileSettings = toml::from_str(text)?;
    settings.validate()?;
    Ok(settings)
  }

  /// Load and validate settings from a TOML file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, TileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| TileError::SettingsIo {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&text)
  }

  pub fn validate(&self) -> Result<(), TileError> {
    let invalid = |msg: String| Err(TileError::InvalidSettings(msg));
    if self.worker_count == 0 {
      return invalid("worker_count must be at least 1".into());
    }
    if self.max_attempts == 0 {
      return invalid("max_attempts must be at least 1".into());
    }
    if self.max_zoom > MAX_SLIPPY_ZOOM {
      return invalid(format!(
        "max_zoom {} exceeds {}",
        self.max_zoom, MAX_SLIPPY_ZOOM
      ));
    }
    if !(0.0..=1.0).contains(&self.transparency) {
      return invalid(format!("transparency {} outside [0, 1]", self.transparency));
    }
    if self.max_nodes < 5 {
      return invalid("max_nodes must hold the root and one child block".into());
    }
    if self.refine_threshold_px <= 0.0 || self.screen_reference_px <= 0.0 {
      return invalid("screen-space thresholds must be positive".into());
    }
    Ok(())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  /// True when switching to `other` requires a different tile source.
  pub fn source_changed(&self, other: &TileSettings) -> bool {
    self.tile_server_address != other.tile_server_address
      || self.tile_server_extension != other.tile_server_extension
      || self.request_timeout_secs != other.request_timeout_secs
      || self.user_agent != other.user_agent
  }

  /// True when switching to `other` invalidates the quadtree layout.
  pub fn layout_changed(&self, other: &TileSettings) -> bool {
    self.max_zoom != other.max_zoom
      || self.map_height != other.map_height
      || self.max_nodes != other.max_nodes
  }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;
