use bulkpost::api::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, LateConfig, VerificationOptions};
use bulkpost::optimizer::{BatchOptions, GlobalRateLimiter, MediaCache, RateLimitTier, RetryOptions};
use bulkpost::runner::SeriesRunnerConfig;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub verification: VerificationConfig,
    pub cache: CacheConfig,
    pub coordinator: CoordinatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_ms: u64,
    pub tier: RateLimitTier,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_ms: 30000,
            tier: RateLimitTier::default(),
        }
    }
}

impl ApiConfig {
    pub fn late_config(&self) -> LateConfig {
        LateConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// Limiter for the configured tier, or `tier` when given.
    pub fn limiter(&self, tier: Option<RateLimitTier>) -> GlobalRateLimiter {
        GlobalRateLimiter::for_tier(tier.unwrap_or(self.tier))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(c: &RetryConfig) -> Self {
        RetryOptions::new(c.max_retries, Duration::from_millis(c.base_delay_ms), c.multiplier)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub delay_between_posts_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            delay_between_posts_ms: 2000,
        }
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(c: &BatchConfig) -> Self {
        BatchOptions::new(c.concurrency, Duration::from_millis(c.delay_between_posts_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: 2,
            delay_ms: 5000,
        }
    }
}

impl From<&VerificationConfig> for VerificationOptions {
    fn from(c: &VerificationConfig) -> Self {
        VerificationOptions {
            attempts: c.attempts,
            delay: Duration::from_millis(c.delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn build(&self) -> MediaCache {
        MediaCache::with_limits(self.capacity, Duration::from_secs(self.ttl_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub max_concurrent_series: usize,
    pub admission_poll_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_series: 5,
            admission_poll_ms: 1000,
        }
    }
}

impl Config {
    /// Runner settings; `verify` is false when verification is disabled here
    /// or on the command line.
    pub fn runner_config(&self, verify: bool) -> SeriesRunnerConfig {
        SeriesRunnerConfig {
            batch: BatchOptions::from(&self.batch),
            verify_posts: verify && self.verification.enabled,
            admission_poll: Duration::from_millis(self.coordinator.admission_poll_ms),
        }
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if let Some(config) = Self::try_load(&primary_config) {
                return Ok(config);
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if let Some(config) = Self::try_load(&fallback_config) {
            return Ok(config);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load an optional config file; a broken one is logged and skipped.
    fn try_load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config from {}: {}", path.display(), e);
                None
            }
        }
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
