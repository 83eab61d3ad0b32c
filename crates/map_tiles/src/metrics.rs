//! Tile streaming statistics.
//!
//! Runtime-toggled so an embedder can stop collection without rebuilding.
//!
//! # Usage
//!
//! ```ignore
//! use map_tiles::metrics::COLLECT_METRICS;
//!
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let metrics = renderer.metrics();
//! println!("{:.1} fps, {} queued", metrics.fps(), metrics.queued);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::MAX_SLIPPY_ZOOM;
use crate::fetch::FetchStats;
use crate::quadtree::QuadtreeStats;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

#[inline]
pub fn is_enabled() -> bool {
    COLLECT_METRICS.load(Ordering::Relaxed)
}

/// Rolling window for storing recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recent value.
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(128) // ~2 seconds at 60fps
    }
}

/// Renderer-level statistics, refreshed every update.
#[derive(Debug, Clone)]
pub struct TileMetrics {
    // Quadtree
    /// Touched nodes per zoom level.
    pub nodes_per_zoom: [u32; MAX_SLIPPY_ZOOM as usize + 1],
    pub live_nodes: usize,
    pub leaves: usize,
    pub visible_leaves: usize,
    pub deepest_zoom: u8,
    pub balance_splits: usize,

    // Fetching
    /// Entries in the fetch work-list after the last queue refresh.
    pub queued: usize,
    pub in_flight: usize,
    /// Cumulative worker counters.
    pub fetch: FetchStats,

    // Textures
    /// Textures uploaded this session.
    pub uploads: u64,
    pub upload_failures: u64,
    /// Textures destroyed after pruning or reset.
    pub released: u64,

    // Drawing (last rendered frame)
    pub draws: u32,
    /// Draws that fell back to an ancestor texture or the placeholder.
    pub fallback_draws: u32,

    // Timing
    /// Quadtree update + queue refresh, in microseconds.
    pub update_timings: RollingWindow<u64>,
    /// Frame delta times, in microseconds.
    pub frame_timings: RollingWindow<u64>,
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self {
            nodes_per_zoom: [0; MAX_SLIPPY_ZOOM as usize + 1],
            live_nodes: 0,
            leaves: 0,
            visible_leaves: 0,
            deepest_zoom: 0,
            balance_splits: 0,
            queued: 0,
            in_flight: 0,
            fetch: FetchStats::default(),
            uploads: 0,
            upload_failures: 0,
            released: 0,
            draws: 0,
            fallback_draws: 0,
            update_timings: RollingWindow::default(),
            frame_timings: RollingWindow::default(),
        }
    }
}

impl TileMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the per-update quadtree snapshot and timings.
    pub fn record_update(&mut self, stats: &QuadtreeStats, update_us: u64, delta_time: f64) {
        if !is_enabled() {
            return;
        }
        self.nodes_per_zoom = stats.nodes_per_zoom;
        self.live_nodes = stats.live_nodes;
        self.leaves = stats.leaves;
        self.visible_leaves = stats.visible_leaves;
        self.deepest_zoom = stats.deepest_zoom;
        self.balance_splits = stats.balance_splits;
        self.update_timings.push(update_us);
        if delta_time > 0.0 {
            self.frame_timings.push((delta_time * 1_000_000.0) as u64);
        }
    }

    pub fn record_queue(&mut self, queued: usize, in_flight: usize, fetch: FetchStats) {
        if !is_enabled() {
            return;
        }
        self.queued = queued;
        self.in_flight = in_flight;
        self.fetch = fetch;
    }

    pub fn record_upload(&mut self, ok: bool) {
        if !is_enabled() {
            return;
        }
        if ok {
            self.uploads += 1;
        } else {
            self.upload_failures += 1;
        }
    }

    pub fn record_released(&mut self, count: usize) {
        if is_enabled() {
            self.released += count as u64;
        }
    }

    pub fn record_draws(&mut self, draws: u32, fallback_draws: u32) {
        if is_enabled() {
            self.draws = draws;
            self.fallback_draws = fallback_draws;
        }
    }

    /// Touched nodes across all zoom levels.
    pub fn touched_nodes(&self) -> u32 {
        self.nodes_per_zoom.iter().sum()
    }

    pub fn avg_update_us(&self) -> f64 {
        self.update_timings.average()
    }

    /// Most recent update time, in microseconds.
    pub fn last_update_us(&self) -> Option<u64> {
        self.update_timings.last().copied()
    }

    /// Fastest and slowest update in the window, in microseconds.
    pub fn update_range_us(&self) -> Option<(u64, u64)> {
        self.update_timings.min_max()
    }

    pub fn fps(&self) -> f64 {
        let frame_us = self.frame_timings.average();
        if frame_us > 0.0 {
            1_000_000.0 / frame_us
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window() {
        let mut window = RollingWindow::new(3);
        assert!(window.is_empty());

        window.push(10u64);
        window.push(20);
        window.push(30);
        assert_eq!(window.average(), 20.0);

        // Oldest is evicted
        window.push(40);
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), 30.0);
        assert_eq!(window.min_max(), Some((20, 40)));
        assert_eq!(window.last(), Some(&40));
    }

    #[test]
    fn test_record_update_copies_snapshot() {
        let mut stats = QuadtreeStats {
            live_nodes: 9,
            leaves: 7,
            visible_leaves: 3,
            deepest_zoom: 2,
            ..Default::default()
        };
        stats.nodes_per_zoom[0] = 1;
        stats.nodes_per_zoom[1] = 4;
        stats.nodes_per_zoom[2] = 4;

        let mut metrics = TileMetrics::new();
        metrics.record_update(&stats, 150, 0.02);
        metrics.record_update(&stats, 250, 0.02);

        assert_eq!(metrics.touched_nodes(), 9);
        assert_eq!(metrics.visible_leaves, 3);
        assert_eq!(metrics.avg_update_us(), 200.0);
        assert_eq!(metrics.last_update_us(), Some(250));
        assert_eq!(metrics.update_range_us(), Some((150, 250)));
        assert!((metrics.fps() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_timings() {
        let metrics = TileMetrics::new();
        assert_eq!(metrics.last_update_us(), None);
        assert_eq!(metrics.update_range_us(), None);
        assert_eq!(metrics.fps(), 0.0);
    }

    #[test]
    fn test_upload_counters() {
        let mut metrics = TileMetrics::new();
        metrics.record_upload(true);
        metrics.record_upload(true);
        metrics.record_upload(false);
        metrics.record_released(2);
        assert_eq!(metrics.uploads, 2);
        assert_eq!(metrics.upload_failures, 1);
        assert_eq!(metrics.released, 2);
    }
}
