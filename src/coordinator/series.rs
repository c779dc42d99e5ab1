//! Series record and related types
//!
//! A series is one bulk-posting job over every media file of a folder. Its
//! record lives only in memory, inside the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesState {
    /// Waiting for an admission slot
    Queued,
    /// Files are being posted
    Processing,
    /// Finished; at least one file posted
    Completed,
    /// Finished with an error
    Failed,
    /// Temporarily held; does not count as active
    Paused,
}

impl SeriesState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesState::Queued => "queued",
            SeriesState::Processing => "processing",
            SeriesState::Completed => "completed",
            SeriesState::Failed => "failed",
            SeriesState::Paused => "paused",
        }
    }

    /// Returns true if the series has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, SeriesState::Completed | SeriesState::Failed)
    }

    /// Returns true if the series occupies an admission slot
    pub fn is_active(&self) -> bool {
        matches!(self, SeriesState::Processing)
    }
}

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The series moved to `processing`
    Started,
    /// Every slot is taken; try again later
    AtCapacity,
    /// The id is not tracked
    NotFound,
    /// The series is no longer queued
    NotQueued(SeriesState),
}

/// File counters of a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesProgress {
    pub total: u32,
    pub processed: u32,
    pub successful: u32,
    pub failed: u32,
}

impl SeriesProgress {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Files not yet resolved
    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.processed)
    }
}

/// Fields to merge into a series' progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub processed: Option<u32>,
    pub successful: Option<u32>,
    pub failed: Option<u32>,
    pub current_file: Option<String>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(mut self, n: u32) -> Self {
        self.processed = Some(n);
        self
    }

    pub fn successful(mut self, n: u32) -> Self {
        self.successful = Some(n);
        self
    }

    pub fn failed(mut self, n: u32) -> Self {
        self.failed = Some(n);
        self
    }

    pub fn current_file(mut self, name: impl Into<String>) -> Self {
        self.current_file = Some(name.into());
        self
    }
}

/// Tracked state of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStatus {
    pub series_id: String,
    pub series_name: String,
    pub status: SeriesState,
    pub progress: SeriesProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

impl SeriesStatus {
    /// Create a queued series with zeroed counters
    pub fn queued(series_id: impl Into<String>, series_name: impl Into<String>, total_files: u32) -> Self {
        Self {
            series_id: series_id.into(),
            series_name: series_name.into(),
            status: SeriesState::Queued,
            progress: SeriesProgress::new(total_files),
            started_at: None,
            completed_at: None,
            error: None,
            current_file: None,
        }
    }

    /// Merge an update; absent fields are left as they are
    pub fn apply(&mut self, update: ProgressUpdate) {
        if let Some(n) = update.processed {
            self.progress.processed = n;
        }
        if let Some(n) = update.successful {
            self.progress.successful = n;
        }
        if let Some(n) = update.failed {
            self.progress.failed = n;
        }
        if update.current_file.is_some() {
            self.current_file = update.current_file;
        }
    }
}

/// Rollup across every tracked series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSummary {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: usize,
    pub total_files: u64,
    pub processed_files: u64,
}
