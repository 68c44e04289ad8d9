//! Numerical constants for voxel traversal and fiber integration.
//!
//! # Voxel Coordinates
//!
//! ```text
//!   grid position:      0         1         2         3
//!                       ●─────────●─────────●─────────●
//!   voxel extent:  ├────┼────┼────┼────┼────┼────┼────┼────┤
//!                -0.5  0.5  1.5  2.5  3.5
//!                       └ voxel 1 ┘
//!
//!   fractional offset = fract(coordinate + 0.5)
//!   boundary  <=>  offset within EPSILON of 0 or 1
//! ```
//!
//! Voxel `i` is centred on grid position `i`. Its two bounding planes sit at
//! coordinates `i - 0.5` and `i + 0.5`, which is where the fractional offset
//! wraps from 1 back to 0.

/// Tolerance for boundary detection and unit-length checks.
pub const EPSILON: f64 = 1e-7;

/// Upper bound on epsilon nudges when a step lands on a voxel boundary.
///
/// Numerical heuristic: each retry pushes the candidate `EPSILON` further
/// along the step direction until it is unambiguously inside one voxel.
pub const MAX_BOUNDARY_RETRIES: usize = 50;

/// Step limit per integration direction is `STEP_LIMIT_FACTOR * cbrt(voxels)`.
pub const STEP_LIMIT_FACTOR: f64 = 5.0;

/// Fractional offset added to a voxel coordinate so boundaries land on 0/1.
pub const VOXEL_HALF: f64 = 0.5;

/// Number of spatial axes.
pub const AXES: usize = 3;

/// Default step limit for a grid with `voxel_count` voxels.
#[inline]
pub fn step_limit(voxel_count: usize) -> usize {
  (STEP_LIMIT_FACTOR * (voxel_count as f64).cbrt()).round() as usize
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
