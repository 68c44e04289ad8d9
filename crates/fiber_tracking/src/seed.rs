//! Seed enumeration.
//!
//! Seeds are enumerated by a four-component odometer: the sub-voxel position
//! along x, y and z, plus a replicate id for multiple seeds at the same
//! position. Replicate varies fastest, x slowest.
//!
//! ```text
//!   component:   x ─── y ─── z ─── replicate
//!   carry:       ◄──── ◄──── ◄──── increment
//!
//!   seeds_per_axis = 2, one voxel (grid position i):
//!
//!      i-0.5     i-0.25    i     i+0.25    i+0.5
//!        ├─────────●───────┼───────●─────────┤
//!                 2i             2i+1          sub-voxel ids
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::DVec3;

use crate::constants::AXES;
use crate::error::{Result, TrackingError};
use crate::grid::Grid;
use crate::job::Job;

/// Component index of the replicate counter.
const REPLICATE: usize = 3;

/// Voxel bounds `[min, max)` per axis that seeds are placed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubRegion {
  pub min: [usize; 3],
  pub max: [usize; 3],
}

impl SubRegion {
  pub fn new(min: [usize; 3], max: [usize; 3]) -> Self {
    Self { min, max }
  }

  /// Every voxel that lies completely inside the grid: `[1, dim - 1)`.
  pub fn interior(dims: [usize; 3]) -> Self {
    Self {
      min: [1; 3],
      max: dims.map(|d| d.saturating_sub(1)),
    }
  }

  /// Check `1 <= min < max <= dim - 1` on every axis.
  pub fn validate(&self, dims: [usize; 3]) -> Result<()> {
    for axis in 0..AXES {
      let (min, max, dim) = (self.min[axis], self.max[axis], dims[axis]);
      if min < 1 || min >= max || max + 1 > dim {
        return Err(TrackingError::InvalidSubRegion {
          axis,
          min,
          max,
          dim,
        });
      }
    }
    Ok(())
  }

  /// Number of voxels in the region.
  pub fn voxel_count(&self) -> usize {
    (0..AXES)
      .map(|axis| self.max[axis].saturating_sub(self.min[axis]))
      .product()
  }
}

/// Mixed-radix counter over every seed of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedIndex {
  origin: DVec3,
  axes: [DVec3; 3],
  /// Spacing between sub-voxel seed positions, in voxels.
  offset: f64,
  current: [usize; 4],
  min: [usize; 4],
  max: [usize; 4],
  done: bool,
}

impl SeedIndex {
  /// Enumerate `seeds_per_axis³` positions per voxel and `seeds_per_position`
  /// replicates per position, over `sub_region` or the grid interior.
  pub fn new(
    grid: &Grid,
    seeds_per_axis: usize,
    seeds_per_position: usize,
    sub_region: Option<SubRegion>,
  ) -> Result<Self> {
    if seeds_per_axis == 0 || seeds_per_position == 0 {
      return Err(TrackingError::InvalidSeeding {
        seeds_per_axis,
        seeds_per_position,
      });
    }

    let region = sub_region.unwrap_or_else(|| SubRegion::interior(grid.dims()));
    region.validate(grid.dims())?;

    let mut min = [0usize; 4];
    let mut max = [0usize; 4];
    for axis in 0..AXES {
      min[axis] = region.min[axis] * seeds_per_axis;
      max[axis] = region.max[axis] * seeds_per_axis;
    }
    max[REPLICATE] = seeds_per_position;

    Ok(Self {
      origin: grid.origin(),
      axes: [grid.axis_vector(0), grid.axis_vector(1), grid.axis_vector(2)],
      offset: 1.0 / seeds_per_axis as f64,
      current: min,
      min,
      max,
      done: false,
    })
  }

  /// Advance to the next seed. Replicate carries into z, z into y, y into x;
  /// `done` is set once x overflows.
  pub fn increment(&mut self) {
    if self.done {
      return;
    }
    for component in (0..4).rev() {
      self.current[component] += 1;
      if self.current[component] < self.max[component] {
        return;
      }
      if component == 0 {
        self.done = true;
        return;
      }
      self.current[component] = self.min[component];
    }
  }

  /// Seed job at the current indices, with an undetermined direction.
  pub fn job(&self) -> Job {
    let mut position = self.origin;
    for axis in 0..AXES {
      let coordinate = self.offset * (0.5 + self.current[axis] as f64) - 0.5;
      position += self.axes[axis] * coordinate;
    }
    Job::seed(position)
  }

  /// Rewind to the first seed.
  pub fn reset(&mut self) {
    self.current = self.min;
    self.done = false;
  }

  #[inline]
  pub fn is_done(&self) -> bool {
    self.done
  }

  /// Current (x, y, z, replicate) indices.
  #[inline]
  pub fn current(&self) -> [usize; 4] {
    self.current
  }

  /// Inclusive lower bounds of the (x, y, z, replicate) indices.
  #[inline]
  pub fn min_index(&self) -> [usize; 4] {
    self.min
  }

  /// Exclusive upper bounds of the (x, y, z, replicate) indices.
  #[inline]
  pub fn max_index(&self) -> [usize; 4] {
    self.max
  }

  /// Total number of seeds a full enumeration yields.
  pub fn total(&self) -> usize {
    (0..4).map(|c| self.max[c] - self.min[c]).product()
  }
}

impl Iterator for SeedIndex {
  type Item = Job;

  fn next(&mut self) -> Option<Job> {
    if self.done {
      return None;
    }
    let job = self.job();
    self.increment();
    Some(job)
  }
}

/// Shared seed cursor handing each seed to exactly one caller.
///
/// The done-check, snapshot and increment happen under one lock, so
/// concurrent `try_take_next` calls never duplicate or skip a seed.
#[derive(Debug)]
pub struct SeedCursor {
  index: Mutex<SeedIndex>,
  total: usize,
  issued: AtomicUsize,
}

impl SeedCursor {
  pub fn new(index: SeedIndex) -> Self {
    Self {
      total: index.total(),
      index: Mutex::new(index),
      issued: AtomicUsize::new(0),
    }
  }

  fn lock(&self) -> MutexGuard<'_, SeedIndex> {
    // The index is never left half-updated, so a poisoned lock is still usable.
    self.index.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Take the next seed, or `None` once every seed has been issued.
  pub fn try_take_next(&self) -> Option<Job> {
    let mut index = self.lock();
    if index.is_done() {
      return None;
    }
    let job = index.job();
    index.increment();
    self.issued.fetch_add(1, Ordering::Relaxed);
    Some(job)
  }

  /// Rewind for a new run.
  pub fn reset(&self) {
    let mut index = self.lock();
    index.reset();
    self.issued.store(0, Ordering::Relaxed);
  }

  /// Seeds handed out since construction or the last reset.
  pub fn issued(&self) -> usize {
    self.issued.load(Ordering::Relaxed)
  }

  /// Seeds a full run issues.
  pub fn total(&self) -> usize {
    self.total
  }

  pub fn is_exhausted(&self) -> bool {
    self.lock().is_done()
  }

  /// Copy of the underlying index.
  pub fn snapshot(&self) -> SeedIndex {
    self.lock().clone()
  }
}

#[cfg(test)]
#[path = "seed_test.rs"]
mod seed_test;
