//! fiber_tracking - Multi-threaded streamline tracking over voxel grids
//!
//! This crate traces streamlines ("fibers") through a direction field
//! sampled on a regular, possibly skewed, 3D grid. Seeds are placed
//! systematically inside every interior voxel; each seed is integrated
//! forward and backward until the field stops it or it leaves the grid.
//!
//! # Features
//!
//! - **Voxel-exact traversal**: One point per voxel crossed, with robust
//!   handling of steps that land on voxel boundaries
//! - **Systematic seeding**: Sub-voxel seed positions and replicate seeds
//!   enumerated by a thread-safe cursor
//! - **Pluggable strategies**: Direction and integration strategies are
//!   injected, so the same tracker drives uniform fields, vector fields or
//!   closures
//! - **Parallel runs**: A rayon worker pool drains the seed cursor with
//!   cooperative cancellation and first-error reporting
//!
//! # Example
//!
//! ```ignore
//! use fiber_tracking::{
//!     FiberCollector, Grid, NearestVectorDirection, Tracker, TrackingConfig, VectorField,
//!     VoxelStepper,
//! };
//!
//! let grid = Grid::unit([64, 64, 64])?;
//! let field = VectorField::new(grid, vectors)?;
//!
//! let collector = FiberCollector::non_empty();
//! let config = TrackingConfig::new().with_seeds_per_axis(2).with_num_threads(8);
//! let tracker = Tracker::new(
//!     &field,
//!     NearestVectorDirection::new().with_min_magnitude(0.1),
//!     VoxelStepper,
//!     &collector,
//!     &config,
//! )?;
//!
//! let report = tracker.run()?;
//! println!("{} seeds in {} us, {} fibers kept",
//!     report.jobs_completed, report.elapsed_us, collector.len());
//! ```

pub mod constants;
pub mod error;

pub use constants::{step_limit, EPSILON, MAX_BOUNDARY_RETRIES};
pub use error::{Result, TrackingError};

// Grid geometry and sampled data
pub mod dataset;
pub mod grid;
pub use dataset::{Dataset, VectorField};
pub use grid::Grid;

// Voxel boundary traversal
pub mod traversal;
pub use traversal::{
  distance_to_boundary, follow_to_next_voxel, is_unit, on_boundary, world_distance,
};

// Tracking state and strategies
pub mod job;
pub mod strategy;
pub use job::{Fiber, Job};
pub use strategy::{
  align_with, DirectionStrategy, EulerStepper, IntegrationStrategy, NearestVectorDirection,
  UniformDirection, VoxelStepper,
};

// Seed enumeration
pub mod seed;
pub use seed::{SeedCursor, SeedIndex, SubRegion};

// Producer/consumer job runner
pub mod threading;
pub use threading::{CancelFlag, RunHandle, RunReport, StripedJobs, ThreadedJobs, WorkerPool};

// Orchestration
pub mod config;
pub mod tracking;
pub mod visitor;
pub use config::TrackingConfig;
pub use tracking::{Tracker, TrackingStats};
pub use visitor::{FiberCollector, FiberCounter, FiberVisitor};
