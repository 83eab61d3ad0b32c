//! Probe configuration.
//!
//! ```toml
//! frames = 600
//!
//! [camera]
//! lat = 51.5007
//! lon = -0.1246
//! height = 800.0
//!
//! [tiles]
//! tile_server_address = "https://tile.openstreetmap.org"
//! max_zoom = 18
//! ```

use anyhow::{Context, Result};
use map_tiles::TileSettings;
use serde::Deserialize;
use std::path::Path;

/// Root configuration for a probe run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Frames to simulate before giving up on a full load.
	pub frames: u32,
	/// Simulated frame rate.
	pub fps: f64,
	pub camera: CameraConfig,
	pub tiles: TileSettings,
}

/// Where the simulated camera sits and where it looks.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
	/// Latitude in degrees of the point below the camera.
	pub lat: f64,
	/// Longitude in degrees of the point below the camera.
	pub lon: f64,
	/// Height above the map plane in metres.
	pub height: f64,
	/// Degrees from straight down; 0 looks at the nadir.
	pub tilt_deg: f64,
	pub fov_deg: f64,
	pub far_plane: f64,
	/// Northward drift in metres per second.
	pub pan_speed: f64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			frames: 600,
			fps: 60.0,
			camera: CameraConfig::default(),
			tiles: TileSettings::default(),
		}
	}
}

impl Default for CameraConfig {
	fn default() -> Self {
		Self {
			lat: 51.5007,
			lon: -0.1246,
			height: 500.0,
			tilt_deg: 0.0,
			fov_deg: 60.0,
			far_plane: 1000.0,
			pan_speed: 0.0,
		}
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.fps <= 0.0 {
			anyhow::bail!("fps must be positive, got {}", self.fps);
		}
		if !(-85.0511..=85.0511).contains(&self.camera.lat) {
			anyhow::bail!("lat {} is outside the web mercator range", self.camera.lat);
		}
		if !(0.0..90.0).contains(&self.camera.tilt_deg) {
			anyhow::bail!("tilt_deg must be in [0, 90), got {}", self.camera.tilt_deg);
		}
		if self.camera.height <= 0.0 || self.camera.far_plane <= 0.0 {
			anyhow::bail!("camera height and far plane must be positive");
		}
		self.tiles.validate().context("Invalid [tiles] settings")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_from_empty_file() {
		let config = Config::parse("").unwrap();
		assert_eq!(config.frames, 600);
		assert_eq!(config.tiles, TileSettings::default());
	}

	#[test]
	fn test_nested_tiles_table() {
		let config = Config::parse(
			r#"
			frames = 10
			[camera]
			height = 1200.0
			[tiles]
			max_zoom = 15
			blend_mode = "underlay"
			"#,
		)
		.unwrap();
		assert_eq!(config.frames, 10);
		assert_eq!(config.camera.height, 1200.0);
		assert_eq!(config.tiles.max_zoom, 15);
		assert_eq!(config.tiles.blend_mode, map_tiles::BlendMode::Underlay);
	}

	#[test]
	fn test_rejects_bad_values() {
		assert!(Config::parse("fps = 0.0").is_err());
		assert!(Config::parse("[camera]\nlat = 89.0").is_err());
		assert!(Config::parse("[tiles]\nworker_count = 0").is_err());
	}

	#[test]
	fn test_load_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("probe.toml");
		std::fs::write(&path, "frames = 3\n").unwrap();
		assert_eq!(Config::load(&path).unwrap().frames, 3);
		assert!(Config::load(&dir.path().join("missing.toml")).is_err());
	}
}
