//! Coordinator for a fixed roster of map reduce workers.
//!
//! A job moves through health check, reset, map, shuffle, reduce and collect
//! barriers. The coordinator only sends commands and input slices; workers
//! move intermediate data between themselves.

pub mod core;
pub mod error;
pub mod jobs;
pub mod worker_info;
pub mod worker_registry;

pub use crate::core::{CoordinatorConfig, MRCoordinator};
pub use crate::error::JobError;
pub use crate::jobs::{JobOutcome, JobSpec, JobState, JobStats};
