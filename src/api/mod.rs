//! Posting service layer
//!
//! This module provides:
//! - Request/response types for the posting service
//! - PostingApi trait for API abstraction, with error classification
//! - LateClient HTTP implementation
//! - MockPostingApi for tests and dry runs
//! - PostingOperations: retried, rate-limited upload/create/verify

pub mod client;
pub mod late;
pub mod mock;
pub mod operations;
pub mod types;

pub use client::{ApiError, PostingApi, is_network_error, is_rate_limit_error};
pub use late::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, LateClient, LateConfig, REQUEST_TIMEOUT};
pub use mock::MockPostingApi;
pub use operations::{PostingOperations, VERIFICATION_ATTEMPTS, VERIFICATION_DELAY, VerificationOptions};
pub use types::{CreatePostRequest, CreatedPost, MediaUpload, PlatformTarget, extract_post_id, media_kind_for};
