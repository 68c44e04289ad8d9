//! Tracking state for one fiber integration.

use glam::DVec3;

/// Ordered points of one streamline.
pub type Fiber = Vec<DVec3>;

/// Mutable (position, direction) pair advanced by the integrator.
///
/// A zero `direction` means the incoming direction is not yet known, which is
/// the case for freshly issued seeds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Job {
  /// World-space position.
  pub position: DVec3,
  /// Incoming unit direction, or zero when undetermined.
  pub direction: DVec3,
}

impl Job {
  pub fn new(position: DVec3, direction: DVec3) -> Self {
    Self {
      position,
      direction,
    }
  }

  /// Job at `position` with an undetermined direction.
  pub fn seed(position: DVec3) -> Self {
    Self::new(position, DVec3::ZERO)
  }

  /// True once an incoming direction has been assigned.
  #[inline]
  pub fn has_direction(&self) -> bool {
    self.direction != DVec3::ZERO
  }
}
