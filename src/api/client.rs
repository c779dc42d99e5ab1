//! Posting service trait and error classification

use std::time::Duration;

use async_trait::async_trait;

use super::types::{CreatePostRequest, CreatedPost, MediaUpload};

/// The external posting service. Each call is one HTTP request; retries and
/// rate limiting are layered on top by [`super::PostingOperations`].
#[async_trait]
pub trait PostingApi: Send + Sync {
    /// Upload a media payload and return the URL the service assigned to it.
    async fn upload_media(&self, upload: &MediaUpload) -> Result<String, ApiError>;

    /// Create (or schedule) a post.
    async fn create_post(&self, request: &CreatePostRequest) -> Result<CreatedPost, ApiError>;

    /// Whether the service currently reports the post as existing.
    async fn post_exists(&self, post_id: &str) -> Result<bool, ApiError>;
}

/// Errors returned by the posting service, classified once at the HTTP
/// boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limited (429): {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("API error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        is_rate_limit_error(self)
    }

    pub fn is_network(&self) -> bool {
        is_network_error(self)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ApiError::Timeout;
        }
        if let Some(status) = e.status() {
            let status = status.as_u16();
            if status == 429 {
                return ApiError::RateLimited {
                    message: e.to_string(),
                    retry_after: None,
                };
            }
            return ApiError::Http {
                status,
                message: e.to_string(),
            };
        }
        if e.is_decode() {
            return ApiError::InvalidResponse(e.to_string());
        }
        if e.is_builder() {
            return ApiError::InvalidRequest(e.to_string());
        }
        ApiError::Network(e.to_string())
    }
}

/// True if the service rejected the call for exceeding its rate limit.
pub fn is_rate_limit_error(err: &ApiError) -> bool {
    err.status() == Some(429) || err.to_string().contains("429")
}

/// True if no HTTP response was received (connection failure or timeout).
pub fn is_network_error(err: &ApiError) -> bool {
    matches!(err, ApiError::Network(_) | ApiError::Timeout)
}
