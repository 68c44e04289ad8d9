use std::sync::atomic::AtomicU64;
use std::time::Duration;

use super::*;

/// Hands out `0..count` through a mutex cursor and records who got what.
struct CountingJobs {
  input: u64,
  count: usize,
  next: Mutex<usize>,
  seen: Mutex<Vec<usize>>,
  sum: AtomicU64,
  fail_at: Option<usize>,
  panic_at: Option<usize>,
  delay: Option<Duration>,
}

impl CountingJobs {
  fn new(count: usize) -> Self {
    Self {
      input: 3,
      count,
      next: Mutex::new(0),
      seen: Mutex::new(Vec::new()),
      sum: AtomicU64::new(0),
      fail_at: None,
      panic_at: None,
      delay: None,
    }
  }

  fn seen_sorted(&self) -> Vec<usize> {
    let mut seen = self.seen.lock().unwrap().clone();
    seen.sort_unstable();
    seen
  }
}

impl ThreadedJobs for CountingJobs {
  type Input = u64;
  type Job = usize;

  fn input(&self) -> &u64 {
    &self.input
  }

  fn get_job(&self) -> Option<usize> {
    let mut next = self.next.lock().unwrap();
    if *next >= self.count {
      return None;
    }
    let job = *next;
    *next += 1;
    Some(job)
  }

  fn compute(&self, input: &u64, job: usize) -> Result<()> {
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }
    if self.fail_at == Some(job) {
      return Err(TrackingError::StartOnBoundary {
        position: glam::DVec3::ZERO,
      });
    }
    if self.panic_at == Some(job) {
      panic!("job {job} exploded");
    }
    self.seen.lock().unwrap().push(job);
    self.sum.fetch_add(job as u64 * input, Ordering::Relaxed);
    Ok(())
  }
}

/// Squares `0..count` into a pre-sized buffer.
struct SquareStripes {
  values: Vec<AtomicU64>,
}

impl SquareStripes {
  fn new(count: usize) -> Self {
    Self {
      values: (0..count).map(|_| AtomicU64::new(u64::MAX)).collect(),
    }
  }
}

impl StripedJobs for SquareStripes {
  type Input = [AtomicU64];

  fn input(&self) -> &[AtomicU64] {
    &self.values
  }

  fn count(&self) -> usize {
    self.values.len()
  }

  fn compute_index(&self, input: &[AtomicU64], index: usize) -> Result<()> {
    let previous = input[index].swap((index * index) as u64, Ordering::Relaxed);
    assert_eq!(previous, u64::MAX, "index {index} computed twice");
    Ok(())
  }
}

// =========================================================================
// Consumer loop
// =========================================================================

#[test]
fn test_run_worker_drains_source() {
  let jobs = CountingJobs::new(10);
  let computed = run_worker(&jobs, &CancelFlag::new()).unwrap();
  assert_eq!(computed, 10);
  assert_eq!(jobs.seen_sorted(), (0..10).collect::<Vec<_>>());
  assert_eq!(jobs.sum.load(Ordering::Relaxed), 3 * 45);
}

#[test]
fn test_run_worker_respects_cancel_before_fetch() {
  let jobs = CountingJobs::new(10);
  let cancel = CancelFlag::new();
  cancel.cancel();
  assert_eq!(run_worker(&jobs, &cancel).unwrap(), 0);
  // Nothing was taken from the source.
  assert_eq!(*jobs.next.lock().unwrap(), 0);
}

#[test]
fn test_run_worker_stops_on_error() {
  let mut jobs = CountingJobs::new(10);
  jobs.fail_at = Some(4);
  let err = run_worker(&jobs, &CancelFlag::new()).unwrap_err();
  assert!(matches!(err, TrackingError::StartOnBoundary { .. }));
  assert_eq!(jobs.seen_sorted(), vec![0, 1, 2, 3]);
}

#[test]
fn test_cancel_flag_reset() {
  let flag = CancelFlag::new();
  let shared = flag.clone();
  assert!(!flag.is_cancelled());
  shared.cancel();
  assert!(flag.is_cancelled());
  flag.reset();
  assert!(!shared.is_cancelled());
}

// =========================================================================
// Striping
// =========================================================================

#[test]
fn test_stripe_ranges_partition() {
  for count in [0, 1, 5, 7, 100, 101] {
    for threads in 1..=9 {
      let mut covered = Vec::new();
      let mut previous_end = 0;
      for t in 0..threads {
        let range = stripe_range(t, threads, count);
        assert_eq!(range.start, previous_end, "gap before thread {t}");
        previous_end = range.end;
        covered.extend(range);
      }
      assert_eq!(covered, (0..count).collect::<Vec<_>>());
    }
  }
}

#[test]
fn test_stripe_range_formula() {
  assert_eq!(stripe_range(0, 3, 10), 0..3);
  assert_eq!(stripe_range(1, 3, 10), 3..6);
  assert_eq!(stripe_range(2, 3, 10), 6..10);
  assert_eq!(stripe_range(3, 3, 10), 0..0);
  assert_eq!(stripe_range(0, 0, 10), 0..0);
}

#[test]
fn test_run_stripe_single_block() {
  let jobs = SquareStripes::new(10);
  let computed = run_stripe(&jobs, 1, 2, &CancelFlag::new()).unwrap();
  assert_eq!(computed, 5);
  assert_eq!(jobs.values[4].load(Ordering::Relaxed), u64::MAX);
  assert_eq!(jobs.values[7].load(Ordering::Relaxed), 49);
}

// =========================================================================
// WorkerPool
// =========================================================================

#[test]
fn test_pool_thread_count() {
  let pool = WorkerPool::new(3).unwrap();
  assert_eq!(pool.num_threads(), 3);
  assert!(WorkerPool::default_threads().unwrap().num_threads() >= 1);
}

#[test]
fn test_pool_runs_every_job_once() {
  let pool = WorkerPool::new(4).unwrap();
  let jobs = CountingJobs::new(1000);
  let report = pool.run(&jobs, &CancelFlag::new()).unwrap();
  assert_eq!(report.workers, 4);
  assert_eq!(report.jobs_completed, 1000);
  assert!(!report.cancelled);
  assert_eq!(jobs.seen_sorted(), (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_pool_striped_run() {
  let pool = WorkerPool::new(3).unwrap();
  let jobs = SquareStripes::new(100);
  let report = pool.run_striped(&jobs, &CancelFlag::new()).unwrap();
  assert_eq!(report.jobs_completed, 100);
  for (i, v) in jobs.values.iter().enumerate() {
    assert_eq!(v.load(Ordering::Relaxed), (i * i) as u64);
  }
}

#[test]
fn test_pool_precancelled_run_does_nothing() {
  let pool = WorkerPool::new(4).unwrap();
  let jobs = CountingJobs::new(100);
  let cancel = CancelFlag::new();
  cancel.cancel();
  let report = pool.run(&jobs, &cancel).unwrap();
  assert_eq!(report.jobs_completed, 0);
  assert!(report.cancelled);
}

#[test]
fn test_pool_reports_worker_error() {
  let pool = WorkerPool::new(4).unwrap();
  let mut jobs = CountingJobs::new(500);
  jobs.fail_at = Some(10);
  let cancel = CancelFlag::new();
  let err = pool.run(&jobs, &cancel).unwrap_err();
  assert!(matches!(err, TrackingError::StartOnBoundary { .. }));
  // The failure raised the flag so the other workers stopped early.
  assert!(cancel.is_cancelled());
  assert!(!jobs.seen_sorted().contains(&10));
}

#[test]
fn test_pool_captures_panic() {
  let pool = WorkerPool::new(2).unwrap();
  let mut jobs = CountingJobs::new(50);
  jobs.panic_at = Some(7);
  let err = pool.run(&jobs, &CancelFlag::new()).unwrap_err();
  match err {
    TrackingError::WorkerPanicked(message) => assert!(message.contains("job 7 exploded")),
    other => panic!("expected WorkerPanicked, got {other:?}"),
  }
}

#[test]
fn test_spawn_and_wait() {
  let pool = WorkerPool::new(4).unwrap();
  let jobs = Arc::new(CountingJobs::new(200));
  let handle = pool.spawn(Arc::clone(&jobs));
  let report = handle.wait().unwrap();
  assert_eq!(report.jobs_completed, 200);
  assert_eq!(jobs.seen_sorted().len(), 200);
}

#[test]
fn test_spawned_run_outlives_pool() {
  let jobs = Arc::new(CountingJobs::new(300));
  let handle = {
    let pool = WorkerPool::new(3).unwrap();
    pool.spawn(Arc::clone(&jobs))
  };
  let report = handle.wait().unwrap();
  assert_eq!(report.workers, 3);
  assert_eq!(report.jobs_completed, 300);
  assert_eq!(jobs.seen_sorted(), (0..300).collect::<Vec<_>>());
}

#[test]
fn test_spawn_and_poll() {
  let pool = WorkerPool::new(2).unwrap();
  let mut handle = pool.spawn(Arc::new(CountingJobs::new(20)));

  let mut finished = false;
  for _ in 0..5000 {
    if handle.is_finished() {
      finished = true;
      break;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  assert!(finished);
  let report = handle.poll().unwrap().as_ref().unwrap();
  assert_eq!(report.jobs_completed, 20);
  // Outcome stays available to wait().
  assert_eq!(handle.wait().unwrap().jobs_completed, 20);
}

#[test]
fn test_spawn_cancel_stops_new_jobs() {
  let pool = WorkerPool::new(2).unwrap();
  let mut jobs = CountingJobs::new(1000);
  jobs.delay = Some(Duration::from_millis(2));
  let handle = pool.spawn(Arc::new(jobs));
  handle.cancel();
  let report = handle.wait().unwrap();
  assert!(report.cancelled);
  assert!(report.jobs_completed < 1000);
}
