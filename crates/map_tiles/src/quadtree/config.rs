//! Quadtree refinement parameters.

use crate::settings::TileSettings;

/// Quadtree limits and screen-space error policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadtreeConfig {
  /// Deepest zoom level nodes may reach.
  pub max_zoom: u8,
  /// Height of the map plane; node corners sit at this `z`.
  pub map_height: f64,
  /// Visible nodes projecting larger than this (pixels) are subdivided.
  pub refine_threshold_px: f64,
  /// Viewport size used to convert NDC extents to pixels.
  pub screen_reference_px: f64,
  /// Node pool capacity including the root.
  pub max_nodes: usize,
  /// 2:1 balance passes per update.
  pub max_balance_iterations: usize,
  /// Trip a debug assertion when the node pool runs out.
  pub assert_on_exhaustion: bool,
}

impl QuadtreeConfig {
  /// Pixel size of an NDC extent.
  #[inline]
  pub fn ndc_to_px(&self, extent: f64) -> f64 {
    extent * 0.5 * self.screen_reference_px
  }
}

impl Default for QuadtreeConfig {
  fn default() -> Self {
    Self::from(&TileSettings::default())
  }
}

impl From<&TileSettings> for QuadtreeConfig {
  fn from(settings: &TileSettings) -> Self {
    Self {
      max_zoom: settings.max_zoom,
      map_height: settings.map_height,
      refine_threshold_px: settings.refine_threshold_px,
      screen_reference_px: settings.screen_reference_px,
      max_nodes: settings.max_nodes,
      max_balance_iterations: settings.max_balance_iterations,
      assert_on_exhaustion: true,
    }
  }
}
