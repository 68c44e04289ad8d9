//! Tracking orchestrator.
//!
//! A [`Tracker`] is a [`ThreadedJobs`] source: workers pull seeds from a
//! shared [`SeedCursor`] and trace one fiber per seed.
//!
//! ```text
//!   seed ──► direction e ──┬─ unit? ──no──► deliver []
//!                          │
//!                          yes
//!                          ▼
//!   forward  (+e):  s ─► f1 ─► f2 ─► … ─► fk        (≤ max_steps)
//!   reverse:        fk … f2 f1 s
//!   backward (−e):  fk … f2 f1 s ─► b1 ─► … ─► bk   (≤ max_steps)
//!                          │
//!                          ▼
//!                   deliver [fk … f1, s, b1 … bk]
//! ```
//!
//! Each accepted point goes to [`FiberVisitor::visit_point`] as it is
//! accepted, seed first. The finished fiber goes to
//! [`FiberVisitor::visit_fiber`] exactly once per seed, empty or not.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;

use crate::config::TrackingConfig;
use crate::constants::step_limit;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::job::{Fiber, Job};
use crate::seed::{SeedCursor, SeedIndex};
use crate::strategy::{DirectionStrategy, IntegrationStrategy};
use crate::threading::{CancelFlag, RunReport, ThreadedJobs, WorkerPool};
use crate::traversal::is_unit;
use crate::visitor::FiberVisitor;

/// Counters gathered while fibers are delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackingStats {
  /// Fibers delivered, including empty ones.
  pub fibers: usize,
  /// Fibers whose seed direction was not a unit vector.
  pub empty_fibers: usize,
  /// Accepted points across all fibers.
  pub points: usize,
}

#[derive(Debug, Default)]
struct StatCounters {
  fibers: AtomicUsize,
  empty_fibers: AtomicUsize,
  points: AtomicUsize,
}

impl StatCounters {
  fn snapshot(&self) -> TrackingStats {
    TrackingStats {
      fibers: self.fibers.load(Ordering::Relaxed),
      empty_fibers: self.empty_fibers.load(Ordering::Relaxed),
      points: self.points.load(Ordering::Relaxed),
    }
  }

  fn clear(&self) {
    self.fibers.store(0, Ordering::Relaxed);
    self.empty_fibers.store(0, Ordering::Relaxed);
    self.points.store(0, Ordering::Relaxed);
  }
}

/// Streamline tracker over a dataset.
///
/// Generic over the dataset `D`, the direction strategy `S`, the integration
/// strategy `I` and the fiber visitor `V`. All four are shared read-only by
/// every worker.
pub struct Tracker<D, S, I, V> {
  dataset: D,
  direction: S,
  integrator: I,
  visitor: V,
  cursor: SeedCursor,
  max_steps: usize,
  num_threads: usize,
  stats: StatCounters,
}

impl<D, S, I, V> Tracker<D, S, I, V>
where
  D: Dataset + Sync,
  S: DirectionStrategy<D>,
  I: IntegrationStrategy,
  V: FiberVisitor,
{
  /// Build a tracker and its seed index.
  ///
  /// Fails on invalid seeding counts or a sub-region that does not fit the
  /// dataset's grid.
  pub fn new(
    dataset: D,
    direction: S,
    integrator: I,
    visitor: V,
    config: &TrackingConfig,
  ) -> Result<Self> {
    config.validate()?;
    let grid = dataset.grid();
    let index = SeedIndex::new(
      grid,
      config.seeds_per_axis,
      config.seeds_per_position,
      config.sub_region,
    )?;
    let max_steps = config
      .max_steps
      .unwrap_or_else(|| step_limit(grid.voxel_count()));

    #[cfg(feature = "tracing")]
    tracing::debug!(
      seeds = index.total(),
      max_steps,
      dims = ?grid.dims(),
      "tracker created"
    );

    Ok(Self {
      dataset,
      direction,
      integrator,
      visitor,
      cursor: SeedCursor::new(index),
      max_steps,
      num_threads: config.num_threads,
      stats: StatCounters::default(),
    })
  }

  /// Trace a single seed without notifying the visitor or the counters.
  pub fn track(&self, seed: Job) -> Result<Fiber> {
    let mut fiber = Vec::new();
    self.trace(&self.dataset, seed, &mut fiber, &mut |_| {})?;
    Ok(fiber)
  }

  /// Run every remaining seed on a pool sized from the config.
  pub fn run(&self) -> Result<RunReport> {
    let pool = WorkerPool::new(self.num_threads)?;
    pool.run(self, &CancelFlag::new())
  }

  /// Trace `seed` into `fiber`, reporting accepted points to `on_point`.
  ///
  /// On error `fiber` holds the points accepted so far, in delivery order.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "tracking::trace"))]
  fn trace<F>(&self, dataset: &D, seed: Job, fiber: &mut Fiber, on_point: &mut F) -> Result<()>
  where
    F: FnMut(DVec3),
  {
    let e = self.direction.direction(dataset, &seed);
    if !is_unit(e) {
      return Ok(());
    }

    fiber.reserve(2 * self.max_steps + 1);
    fiber.push(seed.position);
    on_point(seed.position);

    let forward = self.integrate(dataset, Job::new(seed.position, e), fiber, on_point);
    // Forward points run away from the seed; flip them so the fiber reads
    // through the seed into the backward half.
    fiber.reverse();
    forward?;

    self.integrate(dataset, Job::new(seed.position, -e), fiber, on_point)
  }

  /// Step `job` until the integrator stops or `max_steps` points were added.
  fn integrate<F>(&self, dataset: &D, mut job: Job, fiber: &mut Fiber, on_point: &mut F) -> Result<()>
  where
    F: FnMut(DVec3),
  {
    for _ in 0..self.max_steps {
      if !self
        .integrator
        .next_position(dataset, &mut job, &self.direction)?
      {
        break;
      }
      fiber.push(job.position);
      on_point(job.position);
    }
    Ok(())
  }

  fn deliver(&self, fiber: Fiber) {
    self.stats.fibers.fetch_add(1, Ordering::Relaxed);
    if fiber.is_empty() {
      self.stats.empty_fibers.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(points = fiber.len(), "fiber delivered");

    self.visitor.visit_fiber(fiber);
  }
}

impl<D, S, I, V> Tracker<D, S, I, V> {
  /// Snapshot of the delivery counters.
  pub fn stats(&self) -> TrackingStats {
    self.stats.snapshot()
  }

  /// Rewind the seed cursor and clear the counters for another run.
  pub fn reset(&self) {
    self.cursor.reset();
    self.stats.clear();
  }

  /// Seeds a full run traces.
  pub fn seed_count(&self) -> usize {
    self.cursor.total()
  }

  /// Seeds handed out so far.
  pub fn seeds_issued(&self) -> usize {
    self.cursor.issued()
  }

  /// Step limit per integration direction.
  pub fn max_steps(&self) -> usize {
    self.max_steps
  }

  pub fn dataset(&self) -> &D {
    &self.dataset
  }

  pub fn visitor(&self) -> &V {
    &self.visitor
  }

  /// Consume the tracker and return its visitor.
  pub fn into_visitor(self) -> V {
    self.visitor
  }
}

impl<D, S, I, V> ThreadedJobs for Tracker<D, S, I, V>
where
  D: Dataset + Sync,
  S: DirectionStrategy<D>,
  I: IntegrationStrategy,
  V: FiberVisitor,
{
  type Input = D;
  type Job = Job;

  fn input(&self) -> &D {
    &self.dataset
  }

  fn get_job(&self) -> Option<Job> {
    self.cursor.try_take_next()
  }

  fn compute(&self, dataset: &D, seed: Job) -> Result<()> {
    let mut fiber = Vec::new();
    let points = &self.stats.points;
    let visitor = &self.visitor;
    let outcome = self.trace(dataset, seed, &mut fiber, &mut |point| {
      points.fetch_add(1, Ordering::Relaxed);
      visitor.visit_point(point);
    });
    self.deliver(fiber);
    outcome
  }
}

#[cfg(test)]
#[path = "tracking_test.rs"]
mod tracking_test;
