//! Error types for bulkpost
//!
//! Centralized error handling using thiserror. Errors raised by the posting
//! service live in [`crate::api::ApiError`]; this type covers everything else.

use thiserror::Error;

use crate::api::ApiError;

/// All error types that can occur outside the posting service boundary
#[derive(Debug, Error)]
pub enum BulkpostError {
    /// Series not tracked by the coordinator
    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    /// Series exists but is in the wrong state for the request
    #[error("Series {series_id} is {state}")]
    SeriesBusy { series_id: String, state: String },

    /// Publish time outside the representable range
    #[error("Invalid schedule: {0}")]
    Schedule(String),

    /// Invalid configuration value
    #[error("Invalid config: {0}")]
    Config(String),

    /// Media store could not list or read a file
    #[error("Media error: {0}")]
    Media(String),

    /// Post was created but never became visible
    #[error("Post {0} could not be verified")]
    Unverified(String),

    /// Posting service error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

}

/// Result type alias for bulkpost operations
pub type Result<T> = std::result::Result<T, BulkpostError>;
