//! Process-wide registry of bulk-posting series.
//!
//! The coordinator never fails: unknown ids and invalid transitions are
//! logged and reported with a `false` return. Every method runs under a
//! single lock, so each read-modify-write is atomic.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use super::series::{Admission, CoordinatorSummary, ProgressUpdate, SeriesState, SeriesStatus};

/// Default cap on series in `processing`.
pub const MAX_CONCURRENT_SERIES: usize = 5;

/// Tracks lifecycle and progress of every series in the process.
#[derive(Debug)]
pub struct SeriesCoordinator {
    series: Mutex<HashMap<String, SeriesStatus>>,
    max_concurrent_series: usize,
}

impl SeriesCoordinator {
    pub fn new() -> Self {
        Self::with_max_concurrent(MAX_CONCURRENT_SERIES)
    }

    pub fn with_max_concurrent(max_concurrent_series: usize) -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            max_concurrent_series,
        }
    }

    pub fn max_concurrent_series(&self) -> usize {
        self.max_concurrent_series
    }

    /// Track a new series in `queued` with zeroed counters.
    ///
    /// A finished series with the same id is replaced. Returns false, leaving
    /// the record untouched, while the id is queued, processing or paused.
    pub fn queue_series(&self, series_id: &str, series_name: &str, total_files: u32) -> bool {
        let mut series = self.series.lock();
        if let Some(existing) = series.get(series_id)
            && !existing.status.is_terminal()
        {
            tracing::warn!(series_id, state = ?existing.status, "Series still running, not re-queuing");
            return false;
        }
        series.insert(
            series_id.to_string(),
            SeriesStatus::queued(series_id, series_name, total_files),
        );
        tracing::info!(series_id, series_name, total_files, "Series queued");
        true
    }

    /// Merge counters and/or the current-file label. The caller keeps
    /// `processed = successful + failed`.
    pub fn update_progress(&self, series_id: &str, update: ProgressUpdate) -> bool {
        let mut series = self.series.lock();
        match series.get_mut(series_id) {
            Some(status) => {
                status.apply(update);
                true
            }
            None => {
                tracing::debug!(series_id, "Progress update for unknown series");
                false
            }
        }
    }

    /// Count one resolved file: bumps `processed` and either `successful` or
    /// `failed` together.
    pub fn record_file_outcome(&self, series_id: &str, success: bool) -> bool {
        let mut series = self.series.lock();
        let Some(status) = series.get_mut(series_id) else {
            tracing::debug!(series_id, "File outcome for unknown series");
            return false;
        };

        status.progress.processed += 1;
        if success {
            status.progress.successful += 1;
        } else {
            status.progress.failed += 1;
        }
        true
    }

    /// `queued -> processing`, stamping the start time.
    ///
    /// Does not check [`Self::can_start_new_series`]; admission is advisory.
    pub fn start_processing(&self, series_id: &str) -> bool {
        let mut series = self.series.lock();
        Self::start_locked(&mut series, series_id)
    }

    /// Start the series only if an admission slot is free, checked and taken
    /// under the same lock.
    pub fn try_start_processing(&self, series_id: &str) -> Admission {
        let mut series = self.series.lock();
        match series.get(series_id).map(|s| s.status) {
            None => return Admission::NotFound,
            Some(SeriesState::Queued) => {}
            Some(state) => return Admission::NotQueued(state),
        }
        if Self::count_active(&series) >= self.max_concurrent_series {
            return Admission::AtCapacity;
        }
        if Self::start_locked(&mut series, series_id) {
            Admission::Started
        } else {
            Admission::NotFound
        }
    }

    fn start_locked(series: &mut HashMap<String, SeriesStatus>, series_id: &str) -> bool {
        let Some(status) = series.get_mut(series_id) else {
            tracing::warn!(series_id, "Cannot start unknown series");
            return false;
        };

        if status.status != SeriesState::Queued {
            tracing::warn!(series_id, state = ?status.status, "Cannot start series that is not queued");
            return false;
        }

        status.status = SeriesState::Processing;
        status.started_at = Some(Utc::now());
        tracing::info!(series_id, "Series processing started");
        true
    }

    /// Finish a processing (or paused) series. The error is kept only when
    /// `success` is false. Queued and finished series are left untouched.
    pub fn complete_processing(&self, series_id: &str, success: bool, error: Option<String>) -> bool {
        let mut series = self.series.lock();
        let Some(status) = series.get_mut(series_id) else {
            tracing::warn!(series_id, "Cannot complete unknown series");
            return false;
        };

        if !matches!(status.status, SeriesState::Processing | SeriesState::Paused) {
            tracing::warn!(series_id, state = ?status.status, "Cannot complete series that is not running");
            return false;
        }

        status.completed_at = Some(Utc::now());
        status.current_file = None;
        if success {
            status.status = SeriesState::Completed;
            status.error = None;
            tracing::info!(
                series_id,
                successful = status.progress.successful,
                failed = status.progress.failed,
                "Series completed"
            );
        } else {
            status.status = SeriesState::Failed;
            tracing::error!(series_id, error = ?error, "Series failed");
            status.error = error;
        }
        true
    }

    /// `processing -> paused`.
    pub fn pause_series(&self, series_id: &str) -> bool {
        self.transition(series_id, SeriesState::Processing, SeriesState::Paused)
    }

    /// `paused -> processing`. Not subject to admission control.
    pub fn resume_series(&self, series_id: &str) -> bool {
        self.transition(series_id, SeriesState::Paused, SeriesState::Processing)
    }

    fn transition(&self, series_id: &str, from: SeriesState, to: SeriesState) -> bool {
        let mut series = self.series.lock();
        match series.get_mut(series_id) {
            Some(status) if status.status == from => {
                status.status = to;
                tracing::info!(series_id, from = ?from, to = ?to, "Series state changed");
                true
            }
            Some(status) => {
                tracing::warn!(series_id, state = ?status.status, wanted = ?to, "Invalid series transition");
                false
            }
            None => false,
        }
    }

    fn count_active(series: &HashMap<String, SeriesStatus>) -> usize {
        series.values().filter(|s| s.status.is_active()).count()
    }

    /// Number of series in `processing`.
    pub fn active_count(&self) -> usize {
        Self::count_active(&self.series.lock())
    }

    /// Whether another series may start now. Advisory only.
    pub fn can_start_new_series(&self) -> bool {
        self.active_count() < self.max_concurrent_series
    }

    pub fn series_status(&self, series_id: &str) -> Option<SeriesStatus> {
        self.series.lock().get(series_id).cloned()
    }

    /// Every tracked series, oldest start first, queued series last.
    pub fn all_status(&self) -> Vec<SeriesStatus> {
        let mut all: Vec<SeriesStatus> = self.series.lock().values().cloned().collect();
        all.sort_by(|a, b| match (a.started_at, b.started_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.series_id.cmp(&b.series_id),
        });
        all
    }

    /// Counts by state plus file totals across every tracked series.
    pub fn summary(&self) -> CoordinatorSummary {
        let series = self.series.lock();
        let mut summary = CoordinatorSummary {
            total: series.len(),
            ..Default::default()
        };

        for status in series.values() {
            match status.status {
                SeriesState::Queued => summary.queued += 1,
                SeriesState::Processing => summary.processing += 1,
                SeriesState::Completed => summary.completed += 1,
                SeriesState::Failed => summary.failed += 1,
                SeriesState::Paused => summary.paused += 1,
            }
            summary.total_files += u64::from(status.progress.total);
            summary.processed_files += u64::from(status.progress.processed);
        }

        summary
    }

    /// Drop every completed or failed series; returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut series = self.series.lock();
        let before = series.len();
        series.retain(|_, s| !s.status.is_terminal());
        let removed = before - series.len();
        if removed > 0 {
            tracing::info!(removed, "Cleared finished series");
        }
        removed
    }
}

impl Default for SeriesCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
