//! Read-only field collaborators the tracker integrates through.

use std::sync::Arc;

use glam::DVec3;

use crate::error::{Result, TrackingError};
use crate::grid::Grid;

/// Read-only dataset defined on a regular grid.
///
/// The tracker only needs the grid and an enclosure test. What the dataset
/// stores per position is up to the direction strategy that reads it.
pub trait Dataset {
  /// Grid the dataset is defined on.
  fn grid(&self) -> &Grid;

  /// True if `position` lies inside the dataset's domain.
  fn encloses(&self, position: DVec3) -> bool {
    self.grid().encloses(position)
  }
}

impl<D: Dataset + ?Sized> Dataset for &D {
  fn grid(&self) -> &Grid {
    (**self).grid()
  }

  fn encloses(&self, position: DVec3) -> bool {
    (**self).encloses(position)
  }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
  fn grid(&self) -> &Grid {
    (**self).grid()
  }

  fn encloses(&self, position: DVec3) -> bool {
    (**self).encloses(position)
  }
}

impl Dataset for Grid {
  fn grid(&self) -> &Grid {
    self
  }
}

/// One vector per grid position, e.g. principal eigenvectors of a tensor field.
#[derive(Clone, Debug)]
pub struct VectorField {
  grid: Grid,
  /// Row-major (x slowest, z fastest), see [`Grid::linear_index`].
  vectors: Vec<DVec3>,
}

impl VectorField {
  /// Wrap per-position vectors. `vectors.len()` must equal `grid.voxel_count()`.
  pub fn new(grid: Grid, vectors: Vec<DVec3>) -> Result<Self> {
    let expected = grid.voxel_count();
    if vectors.len() != expected {
      return Err(TrackingError::FieldSizeMismatch {
        expected,
        actual: vectors.len(),
      });
    }
    Ok(Self { grid, vectors })
  }

  /// Same vector at every position.
  pub fn uniform(grid: Grid, vector: DVec3) -> Self {
    let vectors = vec![vector; grid.voxel_count()];
    Self { grid, vectors }
  }

  /// Evaluate `f(index, world_position)` at every grid position.
  pub fn from_fn(grid: Grid, mut f: impl FnMut([usize; 3], DVec3) -> DVec3) -> Self {
    let [nx, ny, nz] = grid.dims();
    let mut vectors = Vec::with_capacity(grid.voxel_count());
    for x in 0..nx {
      for y in 0..ny {
        for z in 0..nz {
          let index = [x, y, z];
          vectors.push(f(index, grid.grid_position(index)));
        }
      }
    }
    Self { grid, vectors }
  }

  #[inline]
  pub fn value(&self, index: [usize; 3]) -> DVec3 {
    self.vectors[self.grid.linear_index(index)]
  }

  /// Vector of the voxel containing `position` (nearest grid position).
  pub fn sample_nearest(&self, position: DVec3) -> Option<DVec3> {
    self.grid.voxel_index(position).map(|index| self.value(index))
  }

  pub fn vectors(&self) -> &[DVec3] {
    &self.vectors
  }
}

impl Dataset for VectorField {
  fn grid(&self) -> &Grid {
    &self.grid
  }
}

#[cfg(test)]
#[path = "dataset_test.rs"]
mod dataset_test;
