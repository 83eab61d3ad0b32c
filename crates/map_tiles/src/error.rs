//! Error types.
//!
//! [`FetchError`] never leaves the fetch workers except through
//! [`TileError::Fetch`] when a tile source cannot be constructed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure fetching or decoding a single tile.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("network error: {0}")]
  Network(String),
  #[error("HTTP status {0}")]
  Status(u16),
  #[error("empty tile response")]
  Empty,
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
  #[error("decode error: {0}")]
  Decode(#[from] image::ImageError),
  #[error("unsupported tile address: {0}")]
  Unsupported(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    FetchError::Network(err.to_string())
  }
}

/// Failure reported by a render backend.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("texture creation failed: {0}")]
  Texture(String),
  #[error("mesh creation failed: {0}")]
  Mesh(String),
}

/// Public error type of the crate.
#[derive(Debug, Error)]
pub enum TileError {
  #[error("failed to read settings from {path}: {source}")]
  SettingsIo {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to parse settings: {0}")]
  SettingsParse(#[from] toml::de::Error),
  #[error("invalid settings: {0}")]
  InvalidSettings(String),
  #[error(transparent)]
  Backend(#[from] BackendError),
  #[error("tile source unavailable: {0}")]
  Fetch(#[from] FetchError),
  #[error("failed to spawn tile worker: {0}")]
  Spawn(#[source] io::Error),
}
