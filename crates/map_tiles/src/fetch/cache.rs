//! Background tile fetch workers.
//!
//! # Flow
//!
//! ```text
//! Render thread                          Worker threads (N)
//! ┌──────────────────────┐
//! │ begin_sync()         │  lock
//! │  request(slot) ──────┼──► work-list ──┐
//! │  upload Downloaded   │                │ wake token
//! │ finish()             │  drop stale    ▼
//! └──────────────────────┘        ┌────────────────────┐
//!                                 │ lock, select_best, │
//!                                 │ pop, Downloading   │
//!                                 ├────────────────────┤
//!                                 │ fetch + decode     │ (unlocked)
//!                                 ├────────────────────┤
//!                                 │ orphaned -> None   │
//!                                 │ ok -> Downloaded   │
//!                                 │ err -> retry/Failed│
//!                                 └────────────────────┘
//! ```
//!
//! The wake channel carries one token per queued entry and acts as a
//! counting semaphore. Idle workers time out every second to observe
//! shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use super::priority::select_best;
use super::slot::TileSlot;
use super::source::{decode_tile, TileSource};
use crate::constants::WORKER_WAKE_TIMEOUT;
use crate::error::{FetchError, TileError};
use crate::types::{LoadStatus, TileImage};

/// Worker pool sizing and retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchConfig {
  pub worker_count: usize,
  pub max_attempts: u8,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      worker_count: 4,
      max_attempts: 3,
    }
  }
}

/// Cumulative worker counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchStats {
  pub downloaded: u64,
  pub retried: u64,
  pub failed: u64,
  pub discarded: u64,
}

struct WorkList {
  entries: Vec<Arc<TileSlot>>,
  source: Arc<dyn TileSource>,
}

struct Shared {
  list: Mutex<WorkList>,
  wake: Sender<()>,
  running: AtomicBool,
  in_flight: AtomicUsize,
  max_attempts: u8,
  downloaded: AtomicU64,
  retried: AtomicU64,
  failed: AtomicU64,
  discarded: AtomicU64,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, WorkList> {
    self.list.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn signal(&self) {
    // Receivers live as long as `Shared`; a send only fails during teardown.
    let _ = self.wake.send(());
  }
}

/// Multi-threaded fetch-and-decode cache.
pub struct TileFetchCache {
  shared: Arc<Shared>,
  workers: Vec<JoinHandle<()>>,
}

impl TileFetchCache {
  /// Spawn `config.worker_count` workers pulling from an empty work-list.
  pub fn start(source: Arc<dyn TileSource>, config: FetchConfig) -> Result<Self, TileError> {
    let (wake, wake_rx) = channel::unbounded();
    let shared = Arc::new(Shared {
      list: Mutex::new(WorkList {
        entries: Vec::new(),
        source,
      }),
      wake,
      running: AtomicBool::new(true),
      in_flight: AtomicUsize::new(0),
      max_attempts: config.max_attempts.max(1),
      downloaded: AtomicU64::new(0),
      retried: AtomicU64::new(0),
      failed: AtomicU64::new(0),
      discarded: AtomicU64::new(0),
    });

    let mut cache = Self {
      shared,
      workers: Vec::with_capacity(config.worker_count),
    };
    for index in 0..config.worker_count.max(1) {
      let shared = Arc::clone(&cache.shared);
      let wake_rx = wake_rx.clone();
      let handle = thread::Builder::new()
        .name(format!("tile-fetch-{index}"))
        .spawn(move || worker_loop(shared, wake_rx))
        .map_err(TileError::Spawn)?;
      cache.workers.push(handle);
    }
    debug!(workers = cache.workers.len(), "tile fetch cache started");
    Ok(cache)
  }

  /// Replace the tile source used by subsequent fetches.
  pub fn set_source(&self, source: Arc<dyn TileSource>) {
    self.shared.lock().source = source;
  }

  /// Lock the work-list for a queue refresh.
  ///
  /// Every entry is marked `try_load = false`; entries not re-requested
  /// before [`QueueSync::finish`] are dropped.
  pub fn begin_sync(&self) -> QueueSync<'_> {
    let list = self.shared.lock();
    for entry in &list.entries {
      entry.set_try_load(false);
    }
    QueueSync {
      list,
      shared: &self.shared,
      queued: 0,
    }
  }

  /// Drop every queued entry, returning their slots to `None`.
  pub fn clear(&self) {
    let mut list = self.shared.lock();
    for entry in list.entries.drain(..) {
      entry.set_try_load(false);
      entry.transition(LoadStatus::InQueue, LoadStatus::None);
    }
  }

  pub fn queue_len(&self) -> usize {
    self.shared.lock().entries.len()
  }

  /// Fetches currently running on workers.
  pub fn in_flight(&self) -> usize {
    self.shared.in_flight.load(Ordering::Acquire)
  }

  pub fn is_running(&self) -> bool {
    self.shared.running.load(Ordering::Acquire)
  }

  pub fn stats(&self) -> FetchStats {
    FetchStats {
      downloaded: self.shared.downloaded.load(Ordering::Relaxed),
      retried: self.shared.retried.load(Ordering::Relaxed),
      failed: self.shared.failed.load(Ordering::Relaxed),
      discarded: self.shared.discarded.load(Ordering::Relaxed),
    }
  }

  /// Stop and join every worker. Fetches in progress run to completion.
  pub fn shutdown(&mut self) {
    if self.workers.is_empty() {
      return;
    }
    self.shared.running.store(false, Ordering::Release);
    for _ in 0..self.workers.len() {
      self.shared.signal();
    }
    for handle in self.workers.drain(..) {
      if handle.join().is_err() {
        warn!("tile fetch worker panicked");
      }
    }
    self.clear();
    debug!("tile fetch cache stopped");
  }
}

impl Drop for TileFetchCache {
  fn drop(&mut self) {
    self.shutdown();
  }
}

/// Work-list held locked for one queue refresh.
pub struct QueueSync<'a> {
  list: MutexGuard<'a, WorkList>,
  shared: &'a Shared,
  queued: usize,
}

impl QueueSync<'_> {
  /// Keep `slot` wanted this frame, queueing it if it has no request yet.
  pub fn request(&mut self, slot: &Arc<TileSlot>) {
    slot.set_try_load(true);
    if slot.transition(LoadStatus::None, LoadStatus::InQueue) {
      slot.reset_attempts();
      self.list.entries.push(Arc::clone(slot));
      self.queued += 1;
      self.shared.signal();
    }
  }

  /// Entries newly queued during this refresh.
  pub fn queued(&self) -> usize {
    self.queued
  }

  /// Drop entries nobody asked for this frame and release the lock.
  pub fn finish(mut self) -> usize {
    let before = self.list.entries.len();
    self.list.entries.retain(|entry| {
      if entry.try_load() {
        return true;
      }
      entry.transition(LoadStatus::InQueue, LoadStatus::None);
      false
    });
    before - self.list.entries.len()
  }
}

// =============================================================================
// Worker
// =============================================================================

fn worker_loop(shared: Arc<Shared>, wake: Receiver<()>) {
  while shared.running.load(Ordering::Acquire) {
    match wake.recv_timeout(WORKER_WAKE_TIMEOUT) {
      Ok(()) | Err(RecvTimeoutError::Timeout) => {}
      Err(RecvTimeoutError::Disconnected) => break,
    }

    while shared.running.load(Ordering::Acquire) {
      let Some((slot, source)) = pop_best(&shared) else {
        break;
      };
      let result = source.fetch(&slot.key()).and_then(|bytes| decode_tile(&bytes));
      complete(&shared, &slot, result);
      shared.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
  }
}

fn pop_best(shared: &Shared) -> Option<(Arc<TileSlot>, Arc<dyn TileSource>)> {
  let mut list = shared.lock();
  let index = select_best(&list.entries)?;
  let slot = list.entries.swap_remove(index);
  slot.set_status(LoadStatus::Downloading);
  slot.record_attempt();
  shared.in_flight.fetch_add(1, Ordering::AcqRel);
  Some((slot, Arc::clone(&list.source)))
}

fn complete(shared: &Shared, slot: &Arc<TileSlot>, result: Result<TileImage, FetchError>) {
  let key = slot.key();

  if !slot.touched() {
    discard(shared, slot);
    return;
  }

  match result {
    Ok(image) => {
      if !slot.store_image(image) {
        discard(shared, slot);
        return;
      }
      slot.set_status(LoadStatus::Downloaded);
      // Detached between the store and the status change.
      if !slot.touched() {
        drop(slot.take_image());
        discard(shared, slot);
        return;
      }
      shared.downloaded.fetch_add(1, Ordering::Relaxed);
    }
    Err(err) if slot.attempts() < shared.max_attempts => {
      debug!(%key, attempt = slot.attempts(), %err, "tile fetch failed, retrying");
      shared.retried.fetch_add(1, Ordering::Relaxed);
      let mut list = shared.lock();
      slot.set_status(LoadStatus::InQueue);
      list.entries.push(Arc::clone(slot));
      drop(list);
      shared.signal();
    }
    Err(err) => {
      warn!(%key, attempts = slot.attempts(), %err, "tile fetch failed");
      slot.set_status(LoadStatus::Failed);
      shared.failed.fetch_add(1, Ordering::Relaxed);
    }
  }
}

fn discard(shared: &Shared, slot: &TileSlot) {
  slot.set_status(LoadStatus::None);
  shared.discarded.fetch_add(1, Ordering::Relaxed);
  trace!(key = %slot.key(), "discarding tile for pruned node");
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
