//! Fiber delivery callbacks.
//!
//! The tracker never keeps fibers; it hands each one to a [`FiberVisitor`]
//! and forgets it. Visitors are called from every worker thread at once and
//! must synchronize internally.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use glam::DVec3;

use crate::job::Fiber;

/// Receives points and finished fibers from worker threads.
pub trait FiberVisitor: Sync {
  /// Called exactly once per seed with the complete (possibly empty) fiber.
  fn visit_fiber(&self, fiber: Fiber);

  /// Called once for every accepted integration point, as it is accepted.
  fn visit_point(&self, _point: DVec3) {}
}

impl<V: FiberVisitor + Send + ?Sized> FiberVisitor for Arc<V> {
  fn visit_fiber(&self, fiber: Fiber) {
    (**self).visit_fiber(fiber)
  }

  fn visit_point(&self, point: DVec3) {
    (**self).visit_point(point)
  }
}

impl<V: FiberVisitor + ?Sized> FiberVisitor for &V {
  fn visit_fiber(&self, fiber: Fiber) {
    (**self).visit_fiber(fiber)
  }

  fn visit_point(&self, point: DVec3) {
    (**self).visit_point(point)
  }
}

/// Counts fibers and points without storing them.
#[derive(Debug, Default)]
pub struct FiberCounter {
  fibers: AtomicUsize,
  empty_fibers: AtomicUsize,
  fiber_points: AtomicUsize,
  visited_points: AtomicUsize,
}

impl FiberCounter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fibers delivered, including empty ones.
  pub fn fibers(&self) -> usize {
    self.fibers.load(Ordering::Relaxed)
  }

  pub fn empty_fibers(&self) -> usize {
    self.empty_fibers.load(Ordering::Relaxed)
  }

  /// Sum of delivered fiber lengths.
  pub fn fiber_points(&self) -> usize {
    self.fiber_points.load(Ordering::Relaxed)
  }

  /// Point callbacks received.
  pub fn visited_points(&self) -> usize {
    self.visited_points.load(Ordering::Relaxed)
  }
}

impl FiberVisitor for FiberCounter {
  fn visit_fiber(&self, fiber: Fiber) {
    self.fibers.fetch_add(1, Ordering::Relaxed);
    self.fiber_points.fetch_add(fiber.len(), Ordering::Relaxed);
    if fiber.is_empty() {
      self.empty_fibers.fetch_add(1, Ordering::Relaxed);
    }
  }

  fn visit_point(&self, _point: DVec3) {
    self.visited_points.fetch_add(1, Ordering::Relaxed);
  }
}

/// Accumulates every delivered fiber.
#[derive(Debug, Default)]
pub struct FiberCollector {
  fibers: Mutex<Vec<Fiber>>,
  points: AtomicUsize,
  /// Drop empty fibers instead of storing them.
  skip_empty: bool,
}

impl FiberCollector {
  pub fn new() -> Self {
    Self::default()
  }

  /// Collector that only keeps fibers with at least one point.
  pub fn non_empty() -> Self {
    Self {
      skip_empty: true,
      ..Self::default()
    }
  }

  /// Number of fibers stored so far.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Point callbacks received so far.
  pub fn point_count(&self) -> usize {
    self.points.load(Ordering::Relaxed)
  }

  /// Take all stored fibers, leaving the collector empty.
  pub fn take(&self) -> Vec<Fiber> {
    std::mem::take(&mut *self.lock())
  }

  /// Consume the collector and return its fibers.
  pub fn into_fibers(self) -> Vec<Fiber> {
    self.fibers.into_inner().unwrap_or_else(PoisonError::into_inner)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Fiber>> {
    self.fibers.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl FiberVisitor for FiberCollector {
  fn visit_fiber(&self, fiber: Fiber) {
    if self.skip_empty && fiber.is_empty() {
      return;
    }
    self.lock().push(fiber);
  }

  fn visit_point(&self, _point: DVec3) {
    self.points.fetch_add(1, Ordering::Relaxed);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counter_tracks_fibers_and_points() {
    let counter = FiberCounter::new();
    counter.visit_point(DVec3::ZERO);
    counter.visit_point(DVec3::ONE);
    counter.visit_fiber(vec![DVec3::ZERO, DVec3::ONE]);
    counter.visit_fiber(Vec::new());

    assert_eq!(counter.fibers(), 2);
    assert_eq!(counter.empty_fibers(), 1);
    assert_eq!(counter.fiber_points(), 2);
    assert_eq!(counter.visited_points(), 2);
  }

  #[test]
  fn collector_stores_fibers() {
    let collector = FiberCollector::new();
    collector.visit_fiber(vec![DVec3::X]);
    collector.visit_fiber(Vec::new());
    assert_eq!(collector.len(), 2);

    let fibers = collector.take();
    assert_eq!(fibers.len(), 2);
    assert!(collector.is_empty());
  }

  #[test]
  fn non_empty_collector_skips_empty_fibers() {
    let collector = FiberCollector::non_empty();
    collector.visit_fiber(Vec::new());
    collector.visit_fiber(vec![DVec3::X, DVec3::Y]);
    assert_eq!(collector.into_fibers(), vec![vec![DVec3::X, DVec3::Y]]);
  }

  #[test]
  fn arc_forwards_to_inner() {
    let counter = Arc::new(FiberCounter::new());
    let shared = Arc::clone(&counter);
    shared.visit_point(DVec3::ZERO);
    shared.visit_fiber(vec![DVec3::ZERO]);
    assert_eq!(counter.fibers(), 1);
    assert_eq!(counter.visited_points(), 1);
  }

  #[test]
  fn concurrent_visits() {
    let collector = FiberCollector::new();
    std::thread::scope(|s| {
      for t in 0..4 {
        let collector = &collector;
        s.spawn(move || {
          for i in 0..100 {
            collector.visit_point(DVec3::splat(i as f64));
            collector.visit_fiber(vec![DVec3::splat(t as f64)]);
          }
        });
      }
    });
    assert_eq!(collector.len(), 400);
    assert_eq!(collector.point_count(), 400);
  }
}
