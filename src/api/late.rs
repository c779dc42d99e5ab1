//! Late posting API client
//!
//! This module implements the PostingApi trait over HTTP with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::error::{BulkpostError, Result};

use super::client::{ApiError, PostingApi};
use super::types::{CreatePostRequest, CreatedPost, MediaUpload, extract_post_id};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://getlate.dev/api/v1";

/// Environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "LATE_API_KEY";

/// Hard timeout for every request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Late client
#[derive(Debug, Clone)]
pub struct LateConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for LateConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl LateConfig {
    /// Create a config for a specific base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Late API client
pub struct LateClient {
    client: Client,
    api_key: String,
    config: LateConfig,
}

impl LateClient {
    /// Create a client reading the API key from `env_var`
    pub fn from_env(env_var: &str, config: LateConfig) -> Result<Self> {
        let api_key = std::env::var(env_var).map_err(|_| BulkpostError::Config(format!("{} not set", env_var)))?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: impl Into<String>, config: LateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BulkpostError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Full URL for an endpoint path
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Turn non-success responses into classified errors
    async fn check_status(response: Response) -> std::result::Result<Response, ApiError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Too Many Requests".to_string());
            return Err(ApiError::RateLimited { message, retry_after });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl PostingApi for LateClient {
    async fn upload_media(&self, upload: &MediaUpload) -> std::result::Result<String, ApiError> {
        let part = Part::bytes(upload.data.to_vec())
            .file_name(upload.filename.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| ApiError::InvalidRequest(format!("bad MIME type {}: {}", upload.mime_type, e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("media"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let body: Value = Self::check_status(response).await?.json().await?;

        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("upload response has no url".to_string()))
    }

    async fn create_post(&self, request: &CreatePostRequest) -> std::result::Result<CreatedPost, ApiError> {
        let response = self
            .client
            .post(self.endpoint("posts"))
            .bearer_auth(&self.api_key)
            .json(&request.to_body())
            .send()
            .await?;

        let body: Value = Self::check_status(response).await?.json().await?;

        extract_post_id(&body)
            .map(CreatedPost::new)
            .ok_or_else(|| ApiError::InvalidResponse("create response has no post id".to_string()))
    }

    async fn post_exists(&self, post_id: &str) -> std::result::Result<bool, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("posts/{}", post_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        Self::check_status(response).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for LateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LateClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LateConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_with_base_url() {
        let config = LateConfig::with_base_url("http://localhost:8080/api/");
        assert_eq!(config.base_url, "http://localhost:8080/api/");
        assert_eq!(config.timeout, REQUEST_TIMEOUT);
    }

    #[test]
    fn test_client_without_api_key() {
        let result = LateClient::from_env("BULKPOST_TEST_KEY_THAT_IS_NEVER_SET", LateConfig::default());
        assert!(matches!(result, Err(BulkpostError::Config(_))));
    }

    #[test]
    fn test_client_with_api_key() {
        let client = LateClient::with_api_key("test-key", LateConfig::default()).unwrap();
        assert!(client.is_ready());
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = LateClient::with_api_key("k", LateConfig::with_base_url("http://localhost:9/api/")).unwrap();
        assert_eq!(client.endpoint("media"), "http://localhost:9/api/media");
        assert_eq!(client.endpoint("/posts/abc"), "http://localhost:9/api/posts/abc");
    }

    #[test]
    fn test_debug_impl_hides_key() {
        let client = LateClient::with_api_key("secret-key", LateConfig::default()).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("LateClient"));
        assert!(debug_str.contains(DEFAULT_BASE_URL));
        assert!(!debug_str.contains("secret-key"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LateClient>();
    }

    #[test]
    fn test_empty_api_key_not_ready() {
        let client = LateClient::with_api_key(String::new(), LateConfig::default()).unwrap();
        assert!(!client.is_ready());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = LateConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        };
        let client = LateClient::with_api_key("k", config).unwrap();

        let err = client.post_exists("p1").await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
    }
}
