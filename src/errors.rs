/*!
 * Error types for the autotranslate service.
 *
 * Every stage of the subtitle pipeline reports failures through one of these
 * enums. None of them is allowed to escape the request boundary: the
 * controller turns each into an empty subtitle list.
 */

use thiserror::Error;

/// Errors that can occur when calling a translation endpoint
///
/// All variants are transient from the point of view of the retry loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

impl ProviderError {
    /// Whether the endpoint asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
    }
}

/// Errors that can occur while locating or downloading an upstream subtitle
#[derive(Error, Debug)]
pub enum SourceError {
    /// No upstream returned a usable candidate
    #[error("No subtitle candidate found for {0}")]
    NotFound(String),

    /// The chosen subtitle could not be fetched
    #[error("Failed to download subtitle from {url}: {reason}")]
    DownloadFailed {
        /// Download URL of the chosen candidate
        url: String,
        /// What went wrong
        reason: String,
    },

    /// The payload could not be turned into text
    #[error("Failed to decode subtitle payload: {0}")]
    Decode(String),
}

/// Errors raised by a cache store
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the backing storage failed
    #[error("Cache storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while stitching a translated document back together
#[derive(Error, Debug, PartialEq)]
pub enum PipelineError {
    /// The translation list does not line up with the chunk list
    #[error("Expected translations for {expected} chunks, got {actual}")]
    Misaligned {
        /// Number of chunks produced by the chunker
        expected: usize,
        /// Number of translated chunks handed to the reassembler
        actual: usize,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the subtitle source
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Error from the document cache
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error from the translation pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
