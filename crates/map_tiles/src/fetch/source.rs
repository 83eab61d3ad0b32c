//! Where tile bytes come from.
//!
//! [`tile_source_for`] picks the implementation from the configured server
//! address: `http://` and `https://` go over the network, anything else is
//! treated as a local tile directory (`file://` prefix optional).

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "http")]
use std::time::Duration;

use image::DynamicImage;

use crate::error::FetchError;
use crate::settings::TileSettings;
use crate::types::{TileImage, TileKey};

/// Fetches the encoded image for one tile. Called from worker threads.
pub trait TileSource: Send + Sync {
  fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError>;
}

/// `{server}/{zoom}/{x}/{y}.{extension}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
  server: String,
  extension: String,
}

impl UrlTemplate {
  pub fn new(server: impl Into<String>, extension: impl Into<String>) -> Self {
    let server = server.into().trim_end_matches('/').to_string();
    let extension = extension.into().trim_start_matches('.').to_string();
    Self { server, extension }
  }

  pub fn server(&self) -> &str {
    &self.server
  }

  pub fn extension(&self) -> &str {
    &self.extension
  }

  pub fn tile_url(&self, key: &TileKey) -> String {
    format!(
      "{}/{}/{}/{}.{}",
      self.server, key.zoom, key.x, key.y, self.extension
    )
  }
}

// =============================================================================
// HTTP
// =============================================================================

/// Blocking HTTP tile source.
#[cfg(feature = "http")]
pub struct HttpTileSource {
  client: reqwest::blocking::Client,
  template: UrlTemplate,
}

#[cfg(feature = "http")]
impl HttpTileSource {
  pub fn new(template: UrlTemplate, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
    let client = reqwest::blocking::Client::builder()
      .timeout(timeout)
      .user_agent(user_agent)
      .build()?;
    Ok(Self { client, template })
  }
}

#[cfg(feature = "http")]
impl TileSource for HttpTileSource {
  fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError> {
    let url = self.template.tile_url(key);
    let response = self.client.get(&url).send()?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }
    let bytes = response.bytes()?;
    if bytes.is_empty() {
      return Err(FetchError::Empty);
    }
    Ok(bytes.to_vec())
  }
}

// =============================================================================
// Local directory
// =============================================================================

/// Tiles laid out on disk as `{root}/{zoom}/{x}/{y}.{extension}`.
#[derive(Clone, Debug)]
pub struct FileTileSource {
  root: PathBuf,
  extension: String,
}

impl FileTileSource {
  pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
    Self {
      root: root.into(),
      extension: extension.into().trim_start_matches('.').to_string(),
    }
  }

  /// Accepts a plain path or a `file://` address.
  pub fn from_address(address: &str, extension: &str) -> Self {
    let path = address.strip_prefix("file://").unwrap_or(address);
    Self::new(Path::new(path), extension)
  }

  pub fn tile_path(&self, key: &TileKey) -> PathBuf {
    self
      .root
      .join(key.zoom.to_string())
      .join(key.x.to_string())
      .join(format!("{}.{}", key.y, self.extension))
  }
}

impl TileSource for FileTileSource {
  fn fetch(&self, key: &TileKey) -> Result<Vec<u8>, FetchError> {
    let bytes = std::fs::read(self.tile_path(key))?;
    if bytes.is_empty() {
      return Err(FetchError::Empty);
    }
    Ok(bytes)
  }
}

/// Tile source for the configured server address.
pub fn tile_source_for(settings: &TileSettings) -> Result<Arc<dyn TileSource>, FetchError> {
  let address = settings.tile_server_address.as_str();
  if address.starts_with("http://") || address.starts_with("https://") {
    return http_source(settings);
  }
  if address.is_empty() {
    return Err(FetchError::Unsupported(address.to_string()));
  }
  Ok(Arc::new(FileTileSource::from_address(
    address,
    &settings.tile_server_extension,
  )))
}

#[cfg(feature = "http")]
fn http_source(settings: &TileSettings) -> Result<Arc<dyn TileSource>, FetchError> {
  let template = UrlTemplate::new(
    settings.tile_server_address.as_str(),
    settings.tile_server_extension.as_str(),
  );
  let source = HttpTileSource::new(template, settings.request_timeout(), &settings.user_agent)?;
  Ok(Arc::new(source))
}

#[cfg(not(feature = "http"))]
fn http_source(settings: &TileSettings) -> Result<Arc<dyn TileSource>, FetchError> {
  Err(FetchError::Unsupported(settings.tile_server_address.clone()))
}

/// Decode PNG/JPEG bytes into RGBA8.
pub fn decode_tile(bytes: &[u8]) -> Result<TileImage, FetchError> {
  if bytes.is_empty() {
    return Err(FetchError::Empty);
  }
  let rgba = match image::load_from_memory(bytes)? {
    DynamicImage::ImageRgba8(rgba) => rgba,
    other => other.to_rgba8(),
  };
  let (width, height) = rgba.dimensions();
  Ok(TileImage {
    width,
    height,
    pixels: rgba.into_raw(),
  })
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
