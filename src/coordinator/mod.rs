//! Series coordination
//!
//! This module contains:
//! - SeriesStatus: the in-memory record of one bulk-posting series
//! - SeriesCoordinator: the registry of every series in the process, with
//!   lifecycle transitions, progress counters, summary and admission control
//!
//! Lifecycle: `queued -> processing -> (completed | failed)`; a processing
//! series may also be paused and resumed. Nothing returns to `queued`.

pub mod registry;
pub mod series;

pub use registry::{MAX_CONCURRENT_SERIES, SeriesCoordinator};
pub use series::{Admission, CoordinatorSummary, ProgressUpdate, SeriesProgress, SeriesState, SeriesStatus};
