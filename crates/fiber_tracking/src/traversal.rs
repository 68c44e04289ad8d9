//! Voxel-to-voxel traversal geometry.
//!
//! Boundaries between voxels are the planes where a voxel coordinate crosses
//! a half-integer. A step goes from the current position to the nearest such
//! plane along the tracking direction, then nudges past it so the new
//! position is owned by exactly one voxel.
//!
//! ```text
//!            boundary (offset 0|1)
//!                  │
//!   ┌──────────────┼──────────────┐
//!   │    voxel i   │   voxel i+1  │
//!   │      ●───────┼─►·           │   t       = distance_to_boundary
//!   │   position   │  candidate   │   retries = +nudge until !on_boundary
//!   └──────────────┼──────────────┘
//! ```

use glam::DVec3;
use smallvec::SmallVec;

use crate::constants::{AXES, EPSILON, MAX_BOUNDARY_RETRIES, VOXEL_HALF};
use crate::dataset::Dataset;
use crate::error::{Result, TrackingError};
use crate::grid::Grid;
use crate::job::Job;
use crate::strategy::DirectionStrategy;

/// True if `v` has unit length within `EPSILON`. NaN is never unit.
#[inline]
pub fn is_unit(v: DVec3) -> bool {
  (v.length() - 1.0).abs() < EPSILON
}

/// Position of `position` inside its voxel along `axis`, wrapped into `[0, 1)`.
///
/// 0 and 1 are the two bounding planes, 0.5 is the voxel centre.
#[inline]
pub fn boundary_offset(grid: &Grid, position: DVec3, axis: usize) -> f64 {
  (grid.voxel_coordinate(position, axis) + VOXEL_HALF).rem_euclid(1.0)
}

/// True if `position` lies within `EPSILON` of a voxel boundary on any axis.
pub fn on_boundary(grid: &Grid, position: DVec3) -> bool {
  (0..AXES).any(|axis| {
    let offset = boundary_offset(grid, position, axis);
    offset < EPSILON || 1.0 - offset < EPSILON
  })
}

/// Distance along `direction` from `position` to the nearest voxel boundary,
/// measured in voxel coordinates.
///
/// The result is the length of the step in voxel space, the same units
/// [`on_boundary`] measures its tolerance in, so it is never below
/// [`EPSILON`] on any grid. Convert it to a world step with
/// [`world_distance`].
///
/// `position` must not be on a boundary; calling this from one is a caller
/// bug and returns [`TrackingError::StartOnBoundary`].
pub fn distance_to_boundary(grid: &Grid, position: DVec3, direction: DVec3) -> Result<f64> {
  if on_boundary(grid, position) {
    return Err(TrackingError::StartOnBoundary { position });
  }

  let velocity = grid.voxel_velocity(direction);
  let speed = velocity.length();
  if speed == 0.0 || !speed.is_finite() {
    return Err(TrackingError::DegenerateDirection { direction });
  }
  let heading = velocity / speed;

  // Signed distances to the lower and upper plane of every axis.
  let mut distances: SmallVec<[f64; 6]> = SmallVec::new();
  for axis in 0..AXES {
    let rate = heading[axis];
    if rate == 0.0 {
      continue;
    }
    let offset = boundary_offset(grid, position, axis);
    distances.push(-offset / rate);
    distances.push((1.0 - offset) / rate);
  }

  // Off-boundary offsets are at least EPSILON from both planes and |rate| <= 1;
  // the clamp only absorbs rounding in the normalization.
  distances
    .into_iter()
    .filter(|d| *d > 0.0 && d.is_finite())
    .min_by(f64::total_cmp)
    .map(|d| d.max(EPSILON))
    .ok_or(TrackingError::DegenerateDirection { direction })
}

/// World distance along `direction` that covers `voxel_distance` in voxel space.
#[inline]
pub fn world_distance(grid: &Grid, direction: DVec3, voxel_distance: f64) -> f64 {
  voxel_distance / grid.voxel_velocity(direction).length()
}

/// Advance `job` into the next voxel along the strategy's direction.
///
/// Returns `Ok(false)` when tracking should stop here: the direction is not a
/// unit vector, the step leaves the dataset, or the boundary could not be
/// disambiguated within [`MAX_BOUNDARY_RETRIES`] nudges. Each nudge moves the
/// fastest-changing voxel coordinate by `EPSILON`, whatever the grid spacing.
/// `job` is only modified on `Ok(true)`.
pub fn follow_to_next_voxel<D, S>(dataset: &D, job: &mut Job, direction: &S) -> Result<bool>
where
  D: Dataset + ?Sized,
  S: DirectionStrategy<D> + ?Sized,
{
  let dir = direction.direction(dataset, job);
  if !is_unit(dir) {
    return Ok(false);
  }

  let grid = dataset.grid();
  let distance = distance_to_boundary(grid, job.position, dir)?;
  let mut t = world_distance(grid, dir, distance);
  let nudge = EPSILON / grid.voxel_velocity(dir).abs().max_element();
  let mut candidate = job.position + dir * t;

  let mut retries = 0;
  while on_boundary(grid, candidate) {
    if retries == MAX_BOUNDARY_RETRIES || !dataset.encloses(candidate) {
      return Ok(false);
    }
    t += nudge;
    candidate = job.position + dir * t;
    retries += 1;
  }

  if !dataset.encloses(candidate) {
    return Ok(false);
  }

  job.position = candidate;
  job.direction = dir;
  Ok(true)
}

#[cfg(test)]
#[path = "traversal_test.rs"]
mod traversal_test;
