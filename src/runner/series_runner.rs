//! Series runner - posts every media file of a folder as one series.
//!
//! For each series the runner:
//! 1. Lists the media and queues the series with the coordinator
//! 2. Waits for an admission slot
//! 3. Posts the files in chunks (cache -> upload -> create -> verify)
//! 4. Records each file's outcome and finishes the series

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{CreatePostRequest, MediaUpload, PlatformTarget, PostingOperations};
use crate::coordinator::{Admission, ProgressUpdate, SeriesCoordinator, SeriesState};
use crate::error::{BulkpostError, Result};
use crate::media::{MediaFile, MediaStore};
use crate::optimizer::{BatchOptions, MediaCache, process_in_parallel};

/// Default pause between admission checks while a series is queued.
pub const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Evenly spaced publish times for the posts of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSchedule {
    pub start: DateTime<Utc>,
    pub interval: chrono::Duration,
}

impl PostSchedule {
    pub fn new(start: DateTime<Utc>, interval: chrono::Duration) -> Self {
        Self { start, interval }
    }

    /// Publish time of the post for file `index`; `None` when it falls
    /// outside the representable date range.
    pub fn slot(&self, index: usize) -> Option<DateTime<Utc>> {
        let steps = i32::try_from(index).ok()?;
        let offset = self.interval.checked_mul(steps)?;
        self.start.checked_add_signed(offset)
    }
}

/// What to post for a series.
#[derive(Debug, Clone)]
pub struct SeriesJob {
    pub series_id: String,
    pub name: String,
    /// Caption used for every post.
    pub text: String,
    pub platforms: Vec<PlatformTarget>,
    /// `None` publishes every post immediately.
    pub schedule: Option<PostSchedule>,
    pub timezone: Option<String>,
}

impl SeriesJob {
    pub fn new(series_id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            name: name.into(),
            text: text.into(),
            platforms: Vec::new(),
            schedule: None,
            timezone: None,
        }
    }

    pub fn with_platform(mut self, target: PlatformTarget) -> Self {
        self.platforms.push(target);
        self
    }

    pub fn with_schedule(mut self, schedule: PostSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Publish time for file `index`, if the series is scheduled.
    fn scheduled_at(&self, index: usize) -> Result<Option<DateTime<Utc>>> {
        match &self.schedule {
            None => Ok(None),
            Some(schedule) => schedule
                .slot(index)
                .map(Some)
                .ok_or_else(|| BulkpostError::Schedule(format!("publish time of post {} is out of range", index))),
        }
    }

    fn request_for(&self, media_url: String, scheduled_at: Option<DateTime<Utc>>) -> CreatePostRequest {
        let mut request = CreatePostRequest::new(self.text.clone())
            .with_media_url(media_url)
            .with_platforms(self.platforms.clone());
        if let Some(at) = scheduled_at {
            request = request.scheduled_for(at);
        }
        if let Some(tz) = &self.timezone {
            request = request.with_timezone(tz.clone());
        }
        request
    }
}

/// Configuration for the SeriesRunner.
#[derive(Debug, Clone)]
pub struct SeriesRunnerConfig {
    pub batch: BatchOptions,
    /// Poll the service after each post until it is visible
    pub verify_posts: bool,
    pub admission_poll: Duration,
}

impl Default for SeriesRunnerConfig {
    fn default() -> Self {
        Self {
            batch: BatchOptions::default(),
            verify_posts: true,
            admission_poll: ADMISSION_POLL_INTERVAL,
        }
    }
}

/// A file that could not be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub index: usize,
    pub file: String,
    pub message: String,
}

/// Result of one series run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesReport {
    pub series_id: String,
    pub state: SeriesState,
    pub successful: usize,
    pub failed: usize,
    /// Created post ids, in file order.
    pub post_ids: Vec<String>,
    pub errors: Vec<FileFailure>,
}

/// Runs series against the shared coordinator, cache and rate limiter.
#[derive(Debug, Clone)]
pub struct SeriesRunner {
    coordinator: Arc<SeriesCoordinator>,
    operations: PostingOperations,
    cache: Arc<MediaCache>,
    config: SeriesRunnerConfig,
}

impl SeriesRunner {
    pub fn new(coordinator: Arc<SeriesCoordinator>, operations: PostingOperations, cache: Arc<MediaCache>) -> Self {
        Self::with_config(coordinator, operations, cache, SeriesRunnerConfig::default())
    }

    pub fn with_config(
        coordinator: Arc<SeriesCoordinator>,
        operations: PostingOperations,
        cache: Arc<MediaCache>,
        config: SeriesRunnerConfig,
    ) -> Self {
        Self {
            coordinator,
            operations,
            cache,
            config,
        }
    }

    pub fn coordinator(&self) -> &Arc<SeriesCoordinator> {
        &self.coordinator
    }

    /// Post every file of `store` as one series.
    ///
    /// Per-file failures are collected in the report. An error is returned
    /// when the series id is already running, when the series stops being
    /// admissible while it waits, or when the media could not be listed (the
    /// series is then recorded as failed).
    pub async fn run(&self, job: &SeriesJob, store: &dyn MediaStore) -> Result<SeriesReport> {
        let series_id = job.series_id.as_str();

        let files = match store.list().await {
            Ok(files) => files,
            Err(e) => {
                self.queue(job, 0)?;
                // Failing requires a started series; this one never takes a slot
                self.coordinator.start_processing(series_id);
                self.coordinator
                    .complete_processing(series_id, false, Some(e.to_string()));
                return Err(e);
            }
        };

        let total = u32::try_from(files.len()).unwrap_or(u32::MAX);
        self.queue(job, total)?;
        self.wait_for_admission(series_id).await?;

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let outcome = process_in_parallel(files, &self.config.batch, |file, index| {
            self.process_file(job, store, file, index)
        })
        .await;

        let post_ids: Vec<String> = outcome.results.iter().flatten().cloned().collect();
        let mut errors: Vec<FileFailure> = outcome
            .errors
            .into_iter()
            .map(|e| FileFailure {
                index: e.index,
                file: names[e.index].clone(),
                message: e.error,
            })
            .collect();
        errors.sort_by_key(|f| f.index);

        let successful = post_ids.len();
        let failed = errors.len();
        if successful == 0 && failed > 0 {
            self.coordinator
                .complete_processing(series_id, false, Some(format!("All {} files failed", failed)));
        } else {
            self.coordinator.complete_processing(series_id, true, None);
        }

        let state = self
            .coordinator
            .series_status(series_id)
            .map(|s| s.status)
            .unwrap_or(SeriesState::Completed);

        Ok(SeriesReport {
            series_id: series_id.to_string(),
            state,
            successful,
            failed,
            post_ids,
            errors,
        })
    }

    fn queue(&self, job: &SeriesJob, total: u32) -> Result<()> {
        if self.coordinator.queue_series(&job.series_id, &job.name, total) {
            return Ok(());
        }
        Err(self.busy_error(&job.series_id))
    }

    fn busy_error(&self, series_id: &str) -> BulkpostError {
        match self.coordinator.series_status(series_id) {
            Some(status) => BulkpostError::SeriesBusy {
                series_id: series_id.to_string(),
                state: status.status.as_str().to_string(),
            },
            None => BulkpostError::SeriesNotFound(series_id.to_string()),
        }
    }

    /// Poll until the series takes an admission slot. Only a full
    /// coordinator is worth waiting for.
    async fn wait_for_admission(&self, series_id: &str) -> Result<()> {
        let mut waited = false;
        loop {
            match self.coordinator.try_start_processing(series_id) {
                Admission::Started => return Ok(()),
                Admission::AtCapacity => {}
                Admission::NotFound => return Err(BulkpostError::SeriesNotFound(series_id.to_string())),
                Admission::NotQueued(state) => {
                    tracing::warn!(series_id, state = state.as_str(), "Series left the queue while waiting");
                    return Err(BulkpostError::SeriesBusy {
                        series_id: series_id.to_string(),
                        state: state.as_str().to_string(),
                    });
                }
            }
            if !waited {
                tracing::info!(
                    series_id,
                    active = self.coordinator.active_count(),
                    max = self.coordinator.max_concurrent_series(),
                    "Series waiting for a free slot"
                );
                waited = true;
            }
            tokio::time::sleep(self.config.admission_poll).await;
        }
    }

    async fn process_file(
        &self,
        job: &SeriesJob,
        store: &dyn MediaStore,
        file: MediaFile,
        index: usize,
    ) -> std::result::Result<String, String> {
        self.coordinator
            .update_progress(&job.series_id, ProgressUpdate::new().current_file(file.name.clone()));

        let result = self.post_file(job, store, &file, index).await;
        self.coordinator
            .record_file_outcome(&job.series_id, result.is_ok());

        result.map_err(|e| {
            tracing::warn!(series_id = %job.series_id, file = %file.name, error = %e, "File failed");
            e.to_string()
        })
    }

    async fn post_file(&self, job: &SeriesJob, store: &dyn MediaStore, file: &MediaFile, index: usize) -> Result<String> {
        let scheduled_at = job.scheduled_at(index)?;
        let url = self.media_url(store, file).await?;
        let post = self.operations.create_post(&job.request_for(url, scheduled_at)).await?;

        if self.config.verify_posts && !self.operations.verify_post(&post.post_id).await {
            return Err(BulkpostError::Unverified(post.post_id));
        }

        tracing::debug!(series_id = %job.series_id, file = %file.name, post_id = %post.post_id, "File posted");
        Ok(post.post_id)
    }

    /// Cached URL for the file, or fetch and upload it.
    async fn media_url(&self, store: &dyn MediaStore, file: &MediaFile) -> Result<String> {
        if let Some(entry) = self.cache.get(&file.id) {
            return Ok(entry.url);
        }

        let data = store.fetch(file).await?;
        let upload = MediaUpload::new(data.clone(), file.name.clone(), file.mime_type.clone());
        let url = self.operations.upload_media(&upload).await?;
        self.cache.put(file.id.clone(), data, url.clone());
        Ok(url)
    }
}
