//! Bulkpost - bulk-scheduling of media series to social platforms
//!
//! A series is every media file of a folder, posted one post per file. Many
//! series may run at once; they share one rate limiter, one media cache and
//! one coordinator that caps how many process concurrently.

pub mod api;
pub mod coordinator;
pub mod error;
pub mod id;
pub mod media;
pub mod optimizer;
pub mod runner;

pub use error::{BulkpostError, Result};
