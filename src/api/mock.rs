//! In-memory posting service for tests and dry runs
//!
//! Calls succeed by default. Failures can be scripted per call (consumed in
//! order) or pinned to a filename so every upload of that file fails.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::client::{ApiError, PostingApi};
use super::types::{CreatePostRequest, CreatedPost, MediaUpload};

#[derive(Debug, Default)]
struct MockState {
    upload_failures: VecDeque<ApiError>,
    create_failures: VecDeque<ApiError>,
    existence_checks: VecDeque<Result<bool, ApiError>>,
    failing_files: HashSet<String>,
    uploads: Vec<String>,
    posts: Vec<CreatePostRequest>,
    checks: Vec<String>,
    next_post: u64,
}

/// Scriptable [`PostingApi`] that records every call.
#[derive(Debug, Default)]
pub struct MockPostingApi {
    state: Mutex<MockState>,
}

impl MockPostingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next uploads with these errors, in order.
    pub fn with_upload_failures(self, errors: Vec<ApiError>) -> Self {
        self.state.lock().upload_failures.extend(errors);
        self
    }

    /// Fail the next post creations with these errors, in order.
    pub fn with_create_failures(self, errors: Vec<ApiError>) -> Self {
        self.state.lock().create_failures.extend(errors);
        self
    }

    /// Answer the next existence checks with these results; afterwards posts
    /// exist.
    pub fn with_existence_checks(self, results: Vec<Result<bool, ApiError>>) -> Self {
        self.state.lock().existence_checks.extend(results);
        self
    }

    /// Fail every upload of `filename`.
    pub fn failing_file(self, filename: impl Into<String>) -> Self {
        self.state.lock().failing_files.insert(filename.into());
        self
    }

    /// Filenames of every upload attempt, including failed ones.
    pub fn upload_calls(&self) -> Vec<String> {
        self.state.lock().uploads.clone()
    }

    /// Every successfully created post.
    pub fn created_posts(&self) -> Vec<CreatePostRequest> {
        self.state.lock().posts.clone()
    }

    /// Post ids of every existence check.
    pub fn existence_calls(&self) -> Vec<String> {
        self.state.lock().checks.clone()
    }
}

#[async_trait]
impl PostingApi for MockPostingApi {
    async fn upload_media(&self, upload: &MediaUpload) -> Result<String, ApiError> {
        let mut state = self.state.lock();
        state.uploads.push(upload.filename.clone());

        if state.failing_files.contains(&upload.filename) {
            return Err(ApiError::Http {
                status: 500,
                message: format!("cannot process {}", upload.filename),
            });
        }
        if let Some(err) = state.upload_failures.pop_front() {
            return Err(err);
        }

        Ok(format!("https://media.mock/{}", upload.filename))
    }

    async fn create_post(&self, request: &CreatePostRequest) -> Result<CreatedPost, ApiError> {
        let mut state = self.state.lock();

        if let Some(err) = state.create_failures.pop_front() {
            return Err(err);
        }

        state.next_post += 1;
        let post_id = format!("post-{}", state.next_post);
        state.posts.push(request.clone());
        Ok(CreatedPost::new(post_id))
    }

    async fn post_exists(&self, post_id: &str) -> Result<bool, ApiError> {
        let mut state = self.state.lock();
        state.checks.push(post_id.to_string());
        state.existence_checks.pop_front().unwrap_or(Ok(true))
    }
}
