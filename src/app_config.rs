use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream subtitle source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Translation endpoint settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Document cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// HTTP server configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL used in subtitle links; derived from the
    /// request `Host` header when unset
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Target language when a request does not name one
    #[serde(default = "default_target_language")]
    pub default_target_language: String,

    /// Budget for producing one translated document
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
            default_target_language: default_target_language(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Request budget as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Upstream subtitle source configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    /// Base URLs of the upstream subtitle addons
    #[serde(default = "default_upstreams")]
    pub upstreams: Vec<String>,

    /// Timeout for listing candidates, in seconds
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,

    /// Timeout for downloading a subtitle file, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// User agent sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            upstreams: default_upstreams(),
            listing_timeout_secs: default_listing_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Translation endpoint configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Base URL of the LibreTranslate-compatible endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key, when the endpoint requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per chunk, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff after a transient failure (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Base backoff after a rate-limit answer (in milliseconds)
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Upper bound for a single backoff (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Max chars per request
    #[serde(default = "default_max_chars_per_request")]
    pub max_chars_per_request: usize,

    /// Pause after each call (in milliseconds)
    #[serde(default)]
    pub pacing_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            concurrent_requests: default_concurrent_requests(),
            max_chars_per_request: default_max_chars_per_request(),
            pacing_ms: 0,
        }
    }
}

impl TranslationConfig {
    /// Per-call timeout, clamped to 15..=30 seconds
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(15, 30))
    }

    /// Worker count for the service, clamped to 2..=4
    pub fn optimal_concurrent_requests(&self) -> usize {
        self.concurrent_requests.clamp(2, 4)
    }

    /// Pause after each call
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// API key if one is set and non-empty
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }
}

/// Where cache entries live
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map, lost on restart
    #[default]
    Memory,
    /// One JSON file per entry
    Disk,
}

/// Document cache configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: CacheBackend,

    /// Directory for the disk backend
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Entry time-to-live in hours
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            directory: None,
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl CacheConfig {
    /// Entry time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }

    /// Configured directory, or the platform cache directory
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("autotranslate")
        })
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_target_language() -> String {
    "pt-BR".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_upstreams() -> Vec<String> {
    vec!["https://opensubtitles-v3.stremio.online".to_string()]
}

fn default_listing_timeout_secs() -> u64 {
    15
}

fn default_download_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("autotranslate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_endpoint() -> String {
    "https://libretranslate.com".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_backoff_ms() -> u64 {
    500 // doubled on each retry
}

fn default_rate_limit_backoff_ms() -> u64 {
    4000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_concurrent_requests() -> usize {
    3
}

fn default_max_chars_per_request() -> usize {
    1500
}

fn default_ttl_hours() -> u64 {
    24 * 7
}

/// Split a comma separated upstream list, trimming blanks and trailing slashes
pub fn parse_upstreams(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load the configuration file, writing a default one when it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::normalize_language_tag(&self.server.default_target_language)
            .context("Invalid default target language")?;

        if self.source.upstreams.is_empty() {
            return Err(anyhow!("At least one upstream subtitle source is required"));
        }

        for upstream in self.source.upstreams.iter().chain(std::iter::once(&self.translation.endpoint)) {
            url::Url::parse(upstream).with_context(|| format!("Invalid URL: {}", upstream))?;
        }

        if let Some(base) = &self.server.public_base_url {
            url::Url::parse(base).with_context(|| format!("Invalid public base URL: {}", base))?;
        }

        if self.translation.max_chars_per_request == 0 {
            return Err(anyhow!("max_chars_per_request must be greater than zero"));
        }

        if self.translation.concurrent_requests == 0 {
            return Err(anyhow!("concurrent_requests must be greater than zero"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }

        Ok(())
    }
}
