//! Rate-limited, retried calls to the posting service.
//!
//! Every HTTP attempt first takes a slot from the shared
//! [`GlobalRateLimiter`], so retries count against the limit just like first
//! attempts. Uploads and post creation retry with exponential backoff and
//! return the last error unchanged; verification never errors.
//!
//! Rate-limit and network failures are logged distinctly but follow the same
//! backoff schedule as every other error.

use std::sync::Arc;
use std::time::Duration;

use crate::optimizer::{GlobalRateLimiter, RetryOptions, with_retry_notify};

use super::client::{ApiError, PostingApi, is_network_error, is_rate_limit_error};
use super::types::{CreatePostRequest, CreatedPost, MediaUpload};

/// Default number of verification polls.
pub const VERIFICATION_ATTEMPTS: u32 = 2;

/// Wait before each verification poll.
pub const VERIFICATION_DELAY: Duration = Duration::from_millis(5000);

/// Verification polling configuration.
#[derive(Debug, Clone)]
pub struct VerificationOptions {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            attempts: VERIFICATION_ATTEMPTS,
            delay: VERIFICATION_DELAY,
        }
    }
}

/// Upload, create and verify, composed with retry and the global limiter.
#[derive(Clone)]
pub struct PostingOperations {
    api: Arc<dyn PostingApi>,
    limiter: Arc<GlobalRateLimiter>,
    retry: RetryOptions,
    verification: VerificationOptions,
}

impl PostingOperations {
    pub fn new(api: Arc<dyn PostingApi>, limiter: Arc<GlobalRateLimiter>) -> Self {
        Self {
            api,
            limiter,
            retry: RetryOptions::default(),
            verification: VerificationOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verification(mut self, verification: VerificationOptions) -> Self {
        self.verification = verification;
        self
    }

    pub fn limiter(&self) -> &Arc<GlobalRateLimiter> {
        &self.limiter
    }

    /// Upload a payload, returning the URL the service assigned.
    pub async fn upload_media(&self, upload: &MediaUpload) -> Result<String, ApiError> {
        let api = &self.api;
        let limiter = &self.limiter;

        with_retry_notify(
            &self.retry,
            |attempt, err: &ApiError| {
                tracing::warn!(
                    attempt,
                    max = self.retry.max_retries,
                    filename = %upload.filename,
                    network = is_network_error(err),
                    error = %err,
                    "Media upload failed, retrying"
                );
            },
            move || async move {
                limiter.wait_for_slot().await;
                api.upload_media(upload).await
            },
        )
        .await
    }

    /// Create a post.
    pub async fn create_post(&self, request: &CreatePostRequest) -> Result<CreatedPost, ApiError> {
        let api = &self.api;
        let limiter = &self.limiter;

        with_retry_notify(
            &self.retry,
            |attempt, err: &ApiError| {
                if is_rate_limit_error(err) {
                    tracing::warn!(
                        attempt,
                        max = self.retry.max_retries,
                        error = %err,
                        "Post creation rate limited (429), retrying"
                    );
                } else {
                    tracing::warn!(
                        attempt,
                        max = self.retry.max_retries,
                        network = is_network_error(err),
                        error = %err,
                        "Post creation failed, retrying"
                    );
                }
            },
            move || async move {
                limiter.wait_for_slot().await;
                api.create_post(request).await
            },
        )
        .await
    }

    /// Poll until the service reports the post, waiting before each poll.
    ///
    /// Failed polls count as "not visible yet". Returns false once every
    /// attempt has been used.
    pub async fn verify_post(&self, post_id: &str) -> bool {
        for attempt in 1..=self.verification.attempts {
            tokio::time::sleep(self.verification.delay).await;
            self.limiter.wait_for_slot().await;

            match self.api.post_exists(post_id).await {
                Ok(true) => {
                    tracing::debug!(post_id, attempt, "Post verified");
                    return true;
                }
                Ok(false) => {
                    tracing::debug!(post_id, attempt, "Post not visible yet");
                }
                Err(err) => {
                    tracing::debug!(post_id, attempt, error = %err, "Verification check failed");
                }
            }
        }

        tracing::warn!(
            post_id,
            attempts = self.verification.attempts,
            "Post could not be verified"
        );
        false
    }
}

impl std::fmt::Debug for PostingOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingOperations")
            .field("retry", &self.retry)
            .field("verification", &self.verification)
            .finish()
    }
}
