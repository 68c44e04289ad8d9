use super::*;

#[test]
fn test_epsilon_is_tiny_but_nonzero() {
  assert!(EPSILON > 0.0);
  assert!(EPSILON < 1e-6);
}

#[test]
fn test_step_limit_scales_with_cube_root() {
  // 7³ grid: 5 * 7 = 35
  assert_eq!(step_limit(343), 35);
  // 10³ grid: 5 * 10 = 50
  assert_eq!(step_limit(1000), 50);
  assert_eq!(step_limit(1), 5);
  assert_eq!(step_limit(0), 0);
}

#[test]
fn test_retry_bound() {
  assert_eq!(MAX_BOUNDARY_RETRIES, 50);
}
