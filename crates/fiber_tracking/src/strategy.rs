//! Pluggable direction and integration strategies.
//!
//! The tracker asks a [`DirectionStrategy`] where to go and an
//! [`IntegrationStrategy`] how far. Both are injected at construction so the
//! same orchestration drives deterministic eigenvector tracking, thresholded
//! fields, or custom integrators.

use std::borrow::Borrow;

use glam::DVec3;

use crate::dataset::{Dataset, VectorField};
use crate::error::Result;
use crate::job::Job;
use crate::traversal::{follow_to_next_voxel, is_unit};

// =============================================================================
// Direction strategies
// =============================================================================

/// Local tracking direction for a job.
///
/// Returns a unit vector to continue tracking, or any non-unit vector (zero
/// is conventional) to stop. Called concurrently from worker threads.
pub trait DirectionStrategy<D: ?Sized>: Sync {
  fn direction(&self, dataset: &D, job: &Job) -> DVec3;
}

impl<D: ?Sized, F> DirectionStrategy<D> for F
where
  F: Fn(&D, &Job) -> DVec3 + Sync,
{
  #[inline]
  fn direction(&self, dataset: &D, job: &Job) -> DVec3 {
    self(dataset, job)
  }
}

/// Flip `v` so it does not point against `incoming`.
///
/// Eigenvector fields carry no sign; aligning with the incoming direction
/// keeps a fiber from reversing on itself. A zero `incoming` leaves `v` as is.
#[inline]
pub fn align_with(v: DVec3, incoming: DVec3) -> DVec3 {
  if incoming.dot(v) < 0.0 {
    -v
  } else {
    v
  }
}

/// Same direction everywhere in the dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformDirection {
  direction: DVec3,
}

impl UniformDirection {
  /// `direction` is normalized; a zero vector makes every fiber empty.
  pub fn new(direction: DVec3) -> Self {
    Self {
      direction: direction.normalize_or_zero(),
    }
  }
}

impl<D: Dataset + ?Sized> DirectionStrategy<D> for UniformDirection {
  fn direction(&self, dataset: &D, job: &Job) -> DVec3 {
    if !dataset.encloses(job.position) {
      return DVec3::ZERO;
    }
    align_with(self.direction, job.direction)
  }
}

/// Nearest-position lookup into a [`VectorField`].
///
/// Stops (returns zero) outside the field, where the stored vector is shorter
/// than `min_magnitude`, or where the path would turn by more than
/// `max_angle` radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestVectorDirection {
  min_magnitude: f64,
  /// Cosine of the maximum turning angle; `None` disables the check.
  min_cos_angle: Option<f64>,
}

impl NearestVectorDirection {
  pub fn new() -> Self {
    Self {
      min_magnitude: 0.0,
      min_cos_angle: None,
    }
  }

  /// Stop where the field magnitude drops below `min_magnitude`.
  pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
    self.min_magnitude = min_magnitude;
    self
  }

  /// Stop where consecutive directions differ by more than `max_angle` radians.
  pub fn with_max_angle(mut self, max_angle: f64) -> Self {
    self.min_cos_angle = Some(max_angle.cos());
    self
  }
}

impl Default for NearestVectorDirection {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: Borrow<VectorField> + ?Sized> DirectionStrategy<D> for NearestVectorDirection {
  fn direction(&self, dataset: &D, job: &Job) -> DVec3 {
    let Some(v) = dataset.borrow().sample_nearest(job.position) else {
      return DVec3::ZERO;
    };
    let magnitude = v.length();
    if magnitude == 0.0 || !magnitude.is_finite() || magnitude < self.min_magnitude {
      return DVec3::ZERO;
    }

    let d = align_with(v / magnitude, job.direction);
    if let Some(min_cos) = self.min_cos_angle {
      if job.has_direction() && d.dot(job.direction) < min_cos {
        return DVec3::ZERO;
      }
    }
    d
  }
}

// =============================================================================
// Integration strategies
// =============================================================================

/// Advances a job by one integration step.
///
/// Returns `Ok(false)` for a normal stop, `Err` only for fatal conditions.
pub trait IntegrationStrategy: Sync {
  fn next_position<D, S>(&self, dataset: &D, job: &mut Job, direction: &S) -> Result<bool>
  where
    D: Dataset + ?Sized,
    S: DirectionStrategy<D> + ?Sized;
}

/// Voxel-exact stepping via [`follow_to_next_voxel`]: one point per voxel crossed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoxelStepper;

impl IntegrationStrategy for VoxelStepper {
  #[inline]
  fn next_position<D, S>(&self, dataset: &D, job: &mut Job, direction: &S) -> Result<bool>
  where
    D: Dataset + ?Sized,
    S: DirectionStrategy<D> + ?Sized,
  {
    follow_to_next_voxel(dataset, job, direction)
  }
}

/// Fixed-length Euler steps, independent of voxel boundaries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EulerStepper {
  pub step_length: f64,
}

impl EulerStepper {
  pub fn new(step_length: f64) -> Self {
    Self { step_length }
  }
}

impl IntegrationStrategy for EulerStepper {
  fn next_position<D, S>(&self, dataset: &D, job: &mut Job, direction: &S) -> Result<bool>
  where
    D: Dataset + ?Sized,
    S: DirectionStrategy<D> + ?Sized,
  {
    let dir = direction.direction(dataset, job);
    if !is_unit(dir) || !self.step_length.is_finite() || self.step_length <= 0.0 {
      return Ok(false);
    }
    let candidate = job.position + dir * self.step_length;
    if !dataset.encloses(candidate) {
      return Ok(false);
    }
    job.position = candidate;
    job.direction = dir;
    Ok(true)
  }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod strategy_test;
