//! Series runner module - drives one series from folder to posts.
//!
//! This module provides:
//! - SeriesRunner, composing coordinator, cache, limiter and API operations
//! - SeriesJob and PostSchedule describing what to post and when
//! - SeriesReport summarizing a finished run

mod series_runner;

pub use series_runner::{
    ADMISSION_POLL_INTERVAL, FileFailure, PostSchedule, SeriesJob, SeriesReport, SeriesRunner, SeriesRunnerConfig,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let config = SeriesRunnerConfig::default();
        assert!(config.verify_posts);
        assert_eq!(config.admission_poll, ADMISSION_POLL_INTERVAL);
    }
}
