//! Regular, possibly skewed, 3D grid and its world <-> voxel mapping.

use glam::{DMat3, DVec3};

use crate::constants::{AXES, EPSILON};
use crate::error::{Result, TrackingError};

/// Regular grid of `dims[0] * dims[1] * dims[2]` positions.
///
/// Grid position `(i, j, k)` sits at
/// `origin + i * axis_vector(0) + j * axis_vector(1) + k * axis_vector(2)`,
/// where `axis_vector(a) = direction(a) * spacing(a)`. The directions need
/// not be orthogonal. Voxel coordinates are the components of a world point
/// in that (scaled) basis, so voxel `i` spans `[i - 0.5, i + 0.5)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
  origin: DVec3,
  /// Unit basis directions.
  directions: [DVec3; 3],
  spacing: [f64; 3],
  dims: [usize; 3],
  /// Inverse of the matrix whose columns are the scaled axis vectors.
  world_to_voxel: DMat3,
}

impl Grid {
  /// Create a grid, validating the basis, spacings and counts.
  ///
  /// Directions are normalized. Fails if any direction is zero, the
  /// directions are (nearly) coplanar, a spacing is not positive, or an
  /// axis has no positions.
  pub fn new(
    origin: DVec3,
    directions: [DVec3; 3],
    spacing: [f64; 3],
    dims: [usize; 3],
  ) -> Result<Self> {
    for axis in 0..AXES {
      if !(spacing[axis].is_finite() && spacing[axis] > 0.0) {
        return Err(TrackingError::InvalidSpacing {
          axis,
          spacing: spacing[axis],
        });
      }
      if dims[axis] == 0 {
        return Err(TrackingError::EmptyGrid { axis });
      }
    }

    let directions = directions.map(|d| d.normalize_or_zero());
    let unit_basis = DMat3::from_cols(directions[0], directions[1], directions[2]);
    let determinant = unit_basis.determinant();
    if !determinant.is_finite() || determinant.abs() < EPSILON {
      return Err(TrackingError::DegenerateGrid { determinant });
    }

    let scaled = DMat3::from_cols(
      directions[0] * spacing[0],
      directions[1] * spacing[1],
      directions[2] * spacing[2],
    );

    Ok(Self {
      origin,
      directions,
      spacing,
      dims,
      world_to_voxel: scaled.inverse(),
    })
  }

  /// Axis-aligned grid with the given origin and spacing.
  pub fn axis_aligned(origin: DVec3, spacing: [f64; 3], dims: [usize; 3]) -> Result<Self> {
    Self::new(origin, [DVec3::X, DVec3::Y, DVec3::Z], spacing, dims)
  }

  /// Axis-aligned grid at the world origin with unit spacing.
  pub fn unit(dims: [usize; 3]) -> Result<Self> {
    Self::axis_aligned(DVec3::ZERO, [1.0; 3], dims)
  }

  #[inline]
  pub fn origin(&self) -> DVec3 {
    self.origin
  }

  /// Unit basis direction of `axis`.
  #[inline]
  pub fn direction(&self, axis: usize) -> DVec3 {
    self.directions[axis]
  }

  #[inline]
  pub fn spacing(&self, axis: usize) -> f64 {
    self.spacing[axis]
  }

  /// Basis direction scaled by spacing: the world offset between neighbouring
  /// grid positions along `axis`.
  #[inline]
  pub fn axis_vector(&self, axis: usize) -> DVec3 {
    self.directions[axis] * self.spacing[axis]
  }

  /// Number of positions per axis.
  #[inline]
  pub fn dims(&self) -> [usize; 3] {
    self.dims
  }

  /// Total number of grid positions (voxels).
  #[inline]
  pub fn voxel_count(&self) -> usize {
    self.dims[0] * self.dims[1] * self.dims[2]
  }

  /// Continuous voxel coordinates of a world point.
  #[inline]
  pub fn world_to_voxel(&self, position: DVec3) -> DVec3 {
    self.world_to_voxel * (position - self.origin)
  }

  /// World point of continuous voxel coordinates.
  #[inline]
  pub fn voxel_to_world(&self, coords: DVec3) -> DVec3 {
    self.origin
      + self.axis_vector(0) * coords.x
      + self.axis_vector(1) * coords.y
      + self.axis_vector(2) * coords.z
  }

  /// Voxel coordinate of `position` along a single axis.
  #[inline]
  pub fn voxel_coordinate(&self, position: DVec3, axis: usize) -> f64 {
    self.world_to_voxel.row(axis).dot(position - self.origin)
  }

  /// Change of the voxel coordinate along `axis` per world unit moved along `direction`.
  #[inline]
  pub fn coordinate_rate(&self, direction: DVec3, axis: usize) -> f64 {
    self.world_to_voxel.row(axis).dot(direction)
  }

  /// Change of all three voxel coordinates per world unit moved along `direction`.
  #[inline]
  pub fn voxel_velocity(&self, direction: DVec3) -> DVec3 {
    self.world_to_voxel * direction
  }

  /// World position of grid position `(i, j, k)`.
  #[inline]
  pub fn grid_position(&self, index: [usize; 3]) -> DVec3 {
    self.voxel_to_world(DVec3::new(
      index[0] as f64,
      index[1] as f64,
      index[2] as f64,
    ))
  }

  /// True if every voxel coordinate lies within `[0, dim - 1]`.
  pub fn encloses(&self, position: DVec3) -> bool {
    let coords = self.world_to_voxel(position);
    coords
      .to_array()
      .iter()
      .zip(self.dims)
      .all(|(&c, dim)| c >= 0.0 && c <= (dim - 1) as f64)
  }

  /// Index of the voxel containing `position`, or `None` outside the grid.
  pub fn voxel_index(&self, position: DVec3) -> Option<[usize; 3]> {
    if !self.encloses(position) {
      return None;
    }
    let coords = self.world_to_voxel(position);
    let mut index = [0usize; 3];
    for axis in 0..AXES {
      let rounded = (coords[axis] + 0.5).floor().max(0.0) as usize;
      index[axis] = rounded.min(self.dims[axis] - 1);
    }
    Some(index)
  }

  /// Row-major linear index (x slowest, z fastest) of a grid position.
  #[inline]
  pub fn linear_index(&self, index: [usize; 3]) -> usize {
    (index[0] * self.dims[1] + index[1]) * self.dims[2] + index[2]
  }
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
