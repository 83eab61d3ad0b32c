//! Work-list candidate selection.
//!
//! The list is small (one entry per outstanding leaf), so every pick rescans
//! it. Ordering, highest first:
//!
//! 1. the root tile, if eligible
//! 2. visible before not visible
//! 3. not yet rendered before rendered
//! 4. nearer to the camera before farther

use std::sync::Arc;

use super::slot::TileSlot;
use crate::types::LoadStatus;

/// Snapshot of the fields a slot is ranked by.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Priority {
  pub visible: bool,
  pub rendered: bool,
  pub distance_sq: f64,
}

impl Priority {
  pub fn of(slot: &TileSlot) -> Self {
    Self {
      visible: slot.visible(),
      rendered: slot.rendered(),
      distance_sq: slot.distance_sq(),
    }
  }

  /// True when `self` should be fetched before `other`.
  pub fn outranks(&self, other: &Priority) -> bool {
    if self.visible != other.visible {
      return self.visible;
    }
    if self.rendered != other.rendered {
      return !self.rendered;
    }
    self.distance_sq < other.distance_sq
  }
}

/// A slot a worker may pick up right now.
#[inline]
pub fn is_eligible(slot: &TileSlot) -> bool {
  slot.try_load() && slot.touched() && slot.status() == LoadStatus::InQueue
}

/// Index of the best eligible entry.
pub fn select_best(entries: &[Arc<TileSlot>]) -> Option<usize> {
  let mut best: Option<(usize, Priority)> = None;

  for (index, slot) in entries.iter().enumerate() {
    if !is_eligible(slot) {
      continue;
    }
    if slot.is_root() {
      return Some(index);
    }
    let priority = Priority::of(slot);
    match &best {
      Some((_, current)) if !priority.outranks(current) => {}
      _ => best = Some((index, priority)),
    }
  }

  best.map(|(index, _)| index)
}

#[cfg(test)]
#[path = "priority_test.rs"]
mod priority_test;
