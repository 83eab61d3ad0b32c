//! map_tiles - Engine independent slippy-map tile streaming
//!
//! Streams web map tiles (`{server}/{zoom}/{x}/{y}.png`) around a 3D camera
//! and draws them through a pluggable graphics backend.
//!
//! # Features
//!
//! - **Quadtree LOD**: per-frame refinement on screen-space error with 2:1
//!   balancing between edge neighbours
//! - **Crack-free meshes**: sixteen pre-stitched 5x5 grids, one per
//!   combination of coarser neighbours
//! - **Background fetching**: worker threads pull the most urgent tile from
//!   a shared work-list, with retries and orphan detection
//! - **Fallback imagery**: missing tiles borrow a sub-rectangle of the
//!   nearest loaded ancestor
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use map_tiles::{Camera, LatLong, NullBackend, TileRenderer, TileSettings, WebMercatorSpace};
//!
//! let space = Arc::new(WebMercatorSpace::centred_on(LatLong::new(51.5, -0.12)));
//! let mut backend = NullBackend::new();
//! let mut renderer = TileRenderer::new(TileSettings::default(), space, &mut backend)?;
//!
//! // Each frame:
//! let view = renderer.frame_view(&camera, delta_time);
//! renderer.update(&mut backend, &view);
//! renderer.render(&mut backend, &camera.view, &camera.projection);
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use error::{BackendError, FetchError, TileError};
pub use types::{Edge, LoadStatus, MeshHandle, NeighbourMask, TextureHandle, TileImage, TileKey};

// Local <-> slippy coordinate transforms
pub mod geo;
pub use geo::{GeoSpace, LatLong, WebMercatorSpace};

pub mod settings;
pub use settings::{BlendMode, TileSettings};

// Camera and per-frame view inputs
pub mod view;
pub use view::{pick_map_plane, view_root, Camera, FrameView, Ray, ViewRoot};

// Stitched tile meshes
pub mod mesh;
pub use mesh::{TileMesh, TileMeshLibrary};

// LOD selection
pub mod quadtree;
pub use quadtree::{Quadtree, QuadtreeConfig, QuadtreeStats};

// Background download and decode
pub mod fetch;
pub use fetch::{FileTileSource, TileFetchCache, TileSource};

pub mod metrics;
pub use metrics::TileMetrics;

pub mod renderer;
pub use renderer::{ElevationSource, ElevationTile, NullBackend, PassDescriptor, RenderBackend, TileDraw, TileRenderer};
