//! Error type shared by grid construction, seeding, traversal and runs.
//!
//! Only fatal conditions are errors. A fiber that stops because the field
//! is below threshold or the path leaves the grid is a normal outcome and is
//! reported as `Ok(false)` by the stepping functions.

use glam::DVec3;
use thiserror::Error;

/// Fatal tracking failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
  /// Grid basis directions are linearly dependent (or zero).
  #[error("grid basis is degenerate (determinant {determinant:e})")]
  DegenerateGrid { determinant: f64 },

  /// A grid spacing is zero, negative or not finite.
  #[error("grid spacing on axis {axis} must be positive and finite, got {spacing}")]
  InvalidSpacing { axis: usize, spacing: f64 },

  /// A grid axis has no positions.
  #[error("grid axis {axis} has no positions")]
  EmptyGrid { axis: usize },

  /// Seed sub-region violates `1 <= min < max <= dim - 1`.
  #[error("seed sub-region [{min}, {max}) on axis {axis} must satisfy 1 <= min < max <= {}", .dim.saturating_sub(1))]
  InvalidSubRegion {
    axis: usize,
    min: usize,
    max: usize,
    dim: usize,
  },

  /// Per-position field data does not match the grid size.
  #[error("field has {actual} values but the grid has {expected} positions")]
  FieldSizeMismatch { expected: usize, actual: usize },

  /// Seeds per axis or seeds per position is zero.
  #[error("seeding needs at least one position per axis and one seed per position (got {seeds_per_axis}, {seeds_per_position})")]
  InvalidSeeding {
    seeds_per_axis: usize,
    seeds_per_position: usize,
  },

  /// Boundary distance was requested from a point that already lies on a boundary.
  #[error("boundary distance queried from on-boundary point {position}")]
  StartOnBoundary { position: DVec3 },

  /// Direction is parallel to every voxel plane (zero or NaN).
  #[error("direction {direction} crosses no voxel boundary")]
  DegenerateDirection { direction: DVec3 },

  /// Worker thread pool could not be built.
  #[error("failed to build worker pool: {0}")]
  ThreadPool(String),

  /// A worker panicked while computing a job.
  #[error("worker panicked: {0}")]
  WorkerPanicked(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = TrackingError> = std::result::Result<T, E>;
