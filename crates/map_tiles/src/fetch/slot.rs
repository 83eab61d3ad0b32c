//! Load state shared between a quadtree node and the fetch workers.
//!
//! A slot lives for one node lifetime. When the node is pruned the slot is
//! detached (`touched = false`); a worker holding it discards its result.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::types::{LoadStatus, TileImage, TileKey};

/// Per-node load state, reachable from both the render and worker threads.
#[derive(Debug)]
pub struct TileSlot {
  key: TileKey,
  is_root: bool,
  status: AtomicU8,
  attempts: AtomicU8,
  try_load: AtomicBool,
  touched: AtomicBool,
  visible: AtomicBool,
  rendered: AtomicBool,
  distance_sq: AtomicU64,
  image: Mutex<Option<TileImage>>,
}

impl TileSlot {
  pub fn new(key: TileKey) -> Self {
    Self {
      key,
      is_root: key == TileKey::ROOT,
      status: AtomicU8::new(LoadStatus::None as u8),
      attempts: AtomicU8::new(0),
      try_load: AtomicBool::new(false),
      touched: AtomicBool::new(true),
      visible: AtomicBool::new(false),
      rendered: AtomicBool::new(false),
      distance_sq: AtomicU64::new(f64::MAX.to_bits()),
      image: Mutex::new(None),
    }
  }

  #[inline]
  pub fn key(&self) -> TileKey {
    self.key
  }

  #[inline]
  pub fn is_root(&self) -> bool {
    self.is_root
  }

  #[inline]
  pub fn status(&self) -> LoadStatus {
    LoadStatus::from_u8(self.status.load(Ordering::Acquire))
  }

  #[inline]
  pub fn set_status(&self, status: LoadStatus) {
    self.status.store(status as u8, Ordering::Release);
  }

  /// Moves `from -> to` only if the slot is still in `from`.
  pub fn transition(&self, from: LoadStatus, to: LoadStatus) -> bool {
    self
      .status
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  #[inline]
  pub fn attempts(&self) -> u8 {
    self.attempts.load(Ordering::Relaxed)
  }

  /// Counts a fetch attempt, returning the new total.
  pub fn record_attempt(&self) -> u8 {
    self.attempts.fetch_add(1, Ordering::Relaxed).saturating_add(1)
  }

  pub fn reset_attempts(&self) {
    self.attempts.store(0, Ordering::Relaxed);
  }

  #[inline]
  pub fn try_load(&self) -> bool {
    self.try_load.load(Ordering::Relaxed)
  }

  #[inline]
  pub fn set_try_load(&self, value: bool) {
    self.try_load.store(value, Ordering::Relaxed);
  }

  /// False once the owning node has been pruned.
  #[inline]
  pub fn touched(&self) -> bool {
    self.touched.load(Ordering::Acquire)
  }

  #[inline]
  pub fn set_touched(&self, value: bool) {
    self.touched.store(value, Ordering::Release);
  }

  #[inline]
  pub fn visible(&self) -> bool {
    self.visible.load(Ordering::Relaxed)
  }

  #[inline]
  pub fn rendered(&self) -> bool {
    self.rendered.load(Ordering::Relaxed)
  }

  #[inline]
  pub fn distance_sq(&self) -> f64 {
    f64::from_bits(self.distance_sq.load(Ordering::Relaxed))
  }

  /// Refresh the fields the worker priority reads.
  pub fn set_priority(&self, visible: bool, rendered: bool, distance_sq: f64) {
    self.visible.store(visible, Ordering::Relaxed);
    self.rendered.store(rendered, Ordering::Relaxed);
    self.distance_sq.store(distance_sq.to_bits(), Ordering::Relaxed);
  }

  #[inline]
  pub fn set_rendered(&self, value: bool) {
    self.rendered.store(value, Ordering::Relaxed);
  }

  /// Stores decoded pixels. Call before publishing `Downloaded`.
  ///
  /// Returns false, dropping `image`, when the slot has already been
  /// detached.
  pub fn store_image(&self, image: TileImage) -> bool {
    let mut stored = self.image.lock().unwrap_or_else(PoisonError::into_inner);
    if !self.touched() {
      return false;
    }
    *stored = Some(image);
    true
  }

  /// Takes the decoded pixels, leaving the slot empty.
  pub fn take_image(&self) -> Option<TileImage> {
    self.image.lock().unwrap_or_else(PoisonError::into_inner).take()
  }

  /// Marks the owning node as gone and frees any pending pixels.
  ///
  /// Holds the image lock while clearing `touched`, so a concurrent
  /// [`store_image`](Self::store_image) either lands first and is freed
  /// here, or sees the detached slot and refuses.
  pub fn detach(&self) {
    let mut stored = self.image.lock().unwrap_or_else(PoisonError::into_inner);
    self.set_touched(false);
    self.set_try_load(false);
    drop(stored.take());
    drop(stored);
    self.transition(LoadStatus::Downloaded, LoadStatus::None);
  }
}
