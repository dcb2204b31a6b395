/*!
 * Mock provider implementations.
 *
 * This module provides providers that simulate different endpoint behaviors:
 * - `MockProvider::identity()` - Always succeeds, returns the input unchanged
 * - `MockProvider::dictionary(..)` - Looks up each blank-line separated block
 * - `MockProvider::intermittent(n)` - Fails every Nth request
 * - `MockProvider::failing()` - Always fails with an error
 *
 * The identity provider also backs the CLI `--dry-run` mode.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::translation::chunking::CHUNK_SEPARATOR;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Returns the input unchanged
    Identity,
    /// Translates each block through a lookup table, unknown blocks unchanged
    Dictionary(HashMap<String, String>),
    /// Uppercases the input, handy to tell translated text apart
    Uppercase,
    /// Fails intermittently (every Nth request, counting from 1)
    Intermittent { fail_every: usize },
    /// Always fails with a transient error
    Failing,
    /// Always answers with a rate-limit error
    RateLimited,
    /// Collapses every block into one line, breaking block alignment
    Merging,
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Number of calls received
    request_count: Arc<AtomicUsize>,
    /// Calls currently running
    in_flight: Arc<AtomicUsize>,
    /// Highest number of concurrent calls observed
    peak_in_flight: Arc<AtomicUsize>,
    /// Artificial latency per call
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Provider that echoes its input
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Provider that translates known blocks from a table
    pub fn dictionary<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::new(MockBehavior::Dictionary(table))
    }

    /// Provider that uppercases its input
    pub fn uppercase() -> Self {
        Self::new(MockBehavior::Uppercase)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that is always rate limited
    pub fn rate_limited() -> Self {
        Self::new(MockBehavior::RateLimited)
    }

    /// Create a mock that merges all blocks of a chunk into one line
    pub fn merging() -> Self {
        Self::new(MockBehavior::Merging)
    }

    /// Add latency to every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far, shared across clones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls that ran at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn translate_blocks(text: &str, f: impl Fn(&str) -> String) -> String {
        text.split(CHUNK_SEPARATOR).map(f).collect::<Vec<_>>().join(CHUNK_SEPARATOR)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.respond(text, count);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("simulated outage".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl MockProvider {
    fn respond(&self, text: &str, count: usize) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Identity => Ok(text.to_string()),
            MockBehavior::Dictionary(table) => Ok(Self::translate_blocks(text, |block| {
                table.get(block).cloned().unwrap_or_else(|| block.to_string())
            })),
            MockBehavior::Uppercase => Ok(text.to_uppercase()),
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == 0 {
                    Err(ProviderError::ConnectionError(format!("simulated failure on request {}", count)))
                } else {
                    Ok(text.to_string())
                }
            },
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 503,
                message: "simulated outage".to_string(),
            }),
            MockBehavior::RateLimited => Err(ProviderError::RateLimitExceeded("simulated 429".to_string())),
            MockBehavior::Merging => Ok(text.split_whitespace().collect::<Vec<_>>().join(" ")),
        }
    }
}
