//! Run configuration.

use crate::error::{Result, TrackingError};
use crate::seed::SubRegion;

/// Seeding and scheduling parameters for a tracking run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingConfig {
  /// Sub-voxel seed positions per axis (`n³` positions per voxel).
  pub seeds_per_axis: usize,

  /// Replicate seeds at each position.
  pub seeds_per_position: usize,

  /// Voxel region to seed. `None` seeds the whole grid interior.
  pub sub_region: Option<SubRegion>,

  /// Worker threads for [`WorkerPool`](crate::threading::WorkerPool).
  /// 0 uses one per CPU.
  pub num_threads: usize,

  /// Integration steps per direction. `None` derives the limit from the
  /// grid size via [`step_limit`](crate::constants::step_limit).
  pub max_steps: Option<usize>,
}

impl Default for TrackingConfig {
  fn default() -> Self {
    Self {
      seeds_per_axis: 1,
      seeds_per_position: 1,
      sub_region: None,
      num_threads: 0,
      max_steps: None,
    }
  }
}

impl TrackingConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_seeds_per_axis(mut self, seeds_per_axis: usize) -> Self {
    self.seeds_per_axis = seeds_per_axis;
    self
  }

  pub fn with_seeds_per_position(mut self, seeds_per_position: usize) -> Self {
    self.seeds_per_position = seeds_per_position;
    self
  }

  pub fn with_sub_region(mut self, sub_region: SubRegion) -> Self {
    self.sub_region = Some(sub_region);
    self
  }

  pub fn with_num_threads(mut self, num_threads: usize) -> Self {
    self.num_threads = num_threads;
    self
  }

  pub fn with_max_steps(mut self, max_steps: usize) -> Self {
    self.max_steps = Some(max_steps);
    self
  }

  /// Reject seeding counts that would enumerate nothing.
  ///
  /// The sub-region depends on the grid and is checked when the seed index
  /// is built.
  pub fn validate(&self) -> Result<()> {
    if self.seeds_per_axis == 0 || self.seeds_per_position == 0 {
      return Err(TrackingError::InvalidSeeding {
        seeds_per_axis: self.seeds_per_axis,
        seeds_per_position: self.seeds_per_position,
      });
    }
    Ok(())
  }
}
