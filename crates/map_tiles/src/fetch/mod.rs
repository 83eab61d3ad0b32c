//! Asynchronous tile download and decode.
//!
//! - [`TileSlot`]: per-node load state shared with workers
//! - [`TileFetchCache`]: worker pool and priority work-list
//! - [`TileSource`]: HTTP or local directory byte source

pub mod cache;
pub mod priority;
pub mod slot;
pub mod source;

pub use cache::{FetchConfig, FetchStats, QueueSync, TileFetchCache};
pub use priority::{select_best, Priority};
pub use slot::TileSlot;
#[cfg(feature = "http")]
pub use source::HttpTileSource;
pub use source::{decode_tile, tile_source_for, FileTileSource, TileSource, UrlTemplate};
