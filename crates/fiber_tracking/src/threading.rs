//! Producer/consumer job runner and a rayon-backed worker pool.
//!
//! Every worker runs the same loop: poll the cancel flag, take a job, compute
//! it, repeat until the source is exhausted. Job sources decide how jobs are
//! handed out ([`ThreadedJobs`] through a shared cursor, [`StripedJobs`]
//! through a static index partition).
//!
//! # Usage
//!
//! ```ignore
//! let pool = WorkerPool::new(8)?;
//! let cancel = CancelFlag::new();
//!
//! // Blocking: returns after every worker stopped.
//! let report = pool.run(&tracker, &cancel)?;
//!
//! // Non-blocking: poll from a UI loop.
//! let mut handle = pool.spawn(Arc::new(tracker));
//! if let Some(outcome) = handle.poll() {
//!     // ...
//! }
//! ```

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{self as channel, Receiver, TryRecvError};
use web_time::Instant;

use crate::error::{Result, TrackingError};

// =============================================================================
// Cancellation
// =============================================================================

/// Shared stop flag, polled once per job fetch.
///
/// Raising it never interrupts a job in flight; workers finish their current
/// job and then return.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }

  /// Lower the flag so the owner can start another run.
  pub fn reset(&self) {
    self.0.store(false, Ordering::Release);
  }
}

// =============================================================================
// Job sources
// =============================================================================

/// Jobs handed out one at a time from shared state.
///
/// `get_job` is called concurrently by every worker and must hand each job to
/// exactly one caller.
pub trait ThreadedJobs: Sync {
  /// Read-only input shared by all jobs.
  type Input: ?Sized;
  type Job;

  fn input(&self) -> &Self::Input;

  /// Next job, or `None` once exhausted.
  fn get_job(&self) -> Option<Self::Job>;

  fn compute(&self, input: &Self::Input, job: Self::Job) -> Result<()>;
}

/// Index-addressable jobs `[0, count)` partitioned statically across workers.
pub trait StripedJobs: Sync {
  type Input: ?Sized;

  fn input(&self) -> &Self::Input;

  fn count(&self) -> usize;

  fn compute_index(&self, input: &Self::Input, index: usize) -> Result<()>;
}

/// Consumer loop for one worker. Returns the number of jobs computed.
///
/// The cancel flag is checked before each fetch, so no job is taken and then
/// dropped. The first fatal error ends this worker's loop.
pub fn run_worker<J: ThreadedJobs + ?Sized>(jobs: &J, cancel: &CancelFlag) -> Result<usize> {
  let input = jobs.input();
  let mut computed = 0;
  while !cancel.is_cancelled() {
    let Some(job) = jobs.get_job() else {
      break;
    };
    jobs.compute(input, job)?;
    computed += 1;
  }
  Ok(computed)
}

/// Contiguous block of `[0, count)` owned by `thread` out of `num_threads`.
///
/// `block_i = [i * count / n, (i + 1) * count / n)`; the last thread runs to
/// `count` so rounding never drops an index.
pub fn stripe_range(thread: usize, num_threads: usize, count: usize) -> Range<usize> {
  if num_threads == 0 || thread >= num_threads {
    return 0..0;
  }
  let start = thread * count / num_threads;
  let end = if thread + 1 == num_threads {
    count
  } else {
    (thread + 1) * count / num_threads
  };
  start..end
}

/// Striped consumer loop for worker `thread` of `num_threads`.
pub fn run_stripe<J: StripedJobs + ?Sized>(
  jobs: &J,
  thread: usize,
  num_threads: usize,
  cancel: &CancelFlag,
) -> Result<usize> {
  let input = jobs.input();
  let mut computed = 0;
  for index in stripe_range(thread, num_threads, jobs.count()) {
    if cancel.is_cancelled() {
      break;
    }
    jobs.compute_index(input, index)?;
    computed += 1;
  }
  Ok(computed)
}

// =============================================================================
// WorkerPool
// =============================================================================

/// Summary of a finished run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
  /// Workers that ran the consumer loop.
  pub workers: usize,
  /// Jobs computed across all workers.
  pub jobs_completed: usize,
  /// Wall-clock run time in microseconds.
  pub elapsed_us: u64,
  /// True if the run stopped because the cancel flag was raised.
  pub cancelled: bool,
}

/// Fixed pool of worker threads driving job sources to exhaustion.
///
/// Any error or panic from one worker fails the whole run: the pool raises
/// the cancel flag so no new jobs start, waits for every worker, then
/// returns the first failure.
pub struct WorkerPool {
  pool: rayon::ThreadPool,
  workers: usize,
}

impl WorkerPool {
  /// Create a pool with `num_threads` workers (0 = one per CPU).
  pub fn new(num_threads: usize) -> Result<Self> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(num_threads)
      .thread_name(|i| format!("fiber-worker-{i}"))
      .build()
      .map_err(|e| TrackingError::ThreadPool(e.to_string()))?;
    let workers = pool.current_num_threads();
    Ok(Self { pool, workers })
  }

  /// Create a pool with one worker per CPU.
  pub fn default_threads() -> Result<Self> {
    Self::new(0)
  }

  pub fn num_threads(&self) -> usize {
    self.workers
  }

  /// Run `jobs` on every worker and block until all have stopped.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "threading::run"))]
  pub fn run<J: ThreadedJobs + ?Sized>(&self, jobs: &J, cancel: &CancelFlag) -> Result<RunReport> {
    let workers = self.workers;
    self
      .pool
      .install(|| run_scoped(workers, cancel, |_| run_worker(jobs, cancel)))
  }

  /// Run striped `jobs`, one contiguous block per worker.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "threading::run_striped"))]
  pub fn run_striped<J: StripedJobs + ?Sized>(
    &self,
    jobs: &J,
    cancel: &CancelFlag,
  ) -> Result<RunReport> {
    let workers = self.workers;
    self.pool.install(|| {
      run_scoped(workers, cancel, |thread| {
        run_stripe(jobs, thread, workers, cancel)
      })
    })
  }

  /// Start `jobs` in the background and return immediately.
  ///
  /// The run holds the pool's threads until it finishes, so the
  /// `WorkerPool` itself may be dropped while the handle is outstanding.
  pub fn spawn<J>(&self, jobs: Arc<J>) -> RunHandle
  where
    J: ThreadedJobs + Send + 'static,
  {
    let (sender, receiver) = channel::bounded(1);
    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();
    let workers = self.workers;

    self.pool.spawn(move || {
      let outcome = run_scoped(workers, &worker_cancel, |_| {
        run_worker(jobs.as_ref(), &worker_cancel)
      });
      // Ignore send error (handle dropped = nobody is waiting)
      let _ = sender.send(outcome);
    });

    RunHandle {
      receiver,
      cancel,
      outcome: None,
    }
  }
}

/// Fan `work` out to `workers` scoped tasks on the current rayon pool.
fn run_scoped<F>(workers: usize, cancel: &CancelFlag, work: F) -> Result<RunReport>
where
  F: Fn(usize) -> Result<usize> + Sync,
{
  let start = Instant::now();
  let completed = AtomicUsize::new(0);
  let failure: Mutex<Option<TrackingError>> = Mutex::new(None);

  #[cfg(feature = "tracing")]
  tracing::debug!(workers, "run started");

  rayon::scope(|s| {
    for thread in 0..workers {
      let (work, completed, failure) = (&work, &completed, &failure);
      s.spawn(move |_| {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(thread)))
          .unwrap_or_else(|payload| Err(TrackingError::WorkerPanicked(panic_message(payload.as_ref()))));
        match outcome {
          Ok(computed) => {
            completed.fetch_add(computed, Ordering::Relaxed);
          }
          Err(err) => {
            cancel.cancel();
            #[cfg(feature = "tracing")]
            tracing::warn!(thread, error = %err, "worker failed, cancelling run");
            let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert(err);
          }
        }
      });
    }
  });

  let elapsed_us = start.elapsed().as_micros() as u64;
  if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
    return Err(err);
  }

  let report = RunReport {
    workers,
    jobs_completed: completed.into_inner(),
    elapsed_us,
    cancelled: cancel.is_cancelled(),
  };

  #[cfg(feature = "tracing")]
  tracing::debug!(
    jobs = report.jobs_completed,
    elapsed_us = report.elapsed_us,
    cancelled = report.cancelled,
    "run finished"
  );

  Ok(report)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}

// =============================================================================
// RunHandle
// =============================================================================

/// Handle to a background run started with [`WorkerPool::spawn`].
pub struct RunHandle {
  receiver: Receiver<Result<RunReport>>,
  cancel: CancelFlag,
  outcome: Option<Result<RunReport>>,
}

impl RunHandle {
  /// Stop handing out new jobs. Jobs in flight still complete.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancel_flag(&self) -> &CancelFlag {
    &self.cancel
  }

  /// Poll for the outcome (non-blocking).
  ///
  /// Returns `Some` once every worker has stopped, `None` while running.
  pub fn poll(&mut self) -> Option<&Result<RunReport>> {
    if self.outcome.is_none() {
      match self.receiver.try_recv() {
        Ok(outcome) => self.outcome = Some(outcome),
        Err(TryRecvError::Empty) => {}
        Err(TryRecvError::Disconnected) => self.outcome = Some(Err(dropped_run())),
      }
    }
    self.outcome.as_ref()
  }

  pub fn is_finished(&mut self) -> bool {
    self.poll().is_some()
  }

  /// Block until the run finishes.
  pub fn wait(mut self) -> Result<RunReport> {
    if let Some(outcome) = self.outcome.take() {
      return outcome;
    }
    self.receiver.recv().unwrap_or_else(|_| Err(dropped_run()))
  }
}

fn dropped_run() -> TrackingError {
  TrackingError::WorkerPanicked("worker pool dropped the run".to_string())
}

#[cfg(test)]
#[path = "threading_test.rs"]
mod threading_test;
