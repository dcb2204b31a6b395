/*!
 * Translation client with retry, backoff and fallback.
 *
 * Each chunk becomes a `TranslationJob` that moves through
 * `Pending -> Retrying(n) -> Succeeded | FallenBack`. The transition logic is
 * pure; only `TranslationClient::run_job` touches the network and the clock.
 * Exhausting the attempt ceiling never fails the caller: the original text
 * comes back and the outcome is marked as degraded.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use log::{debug, warn};
use rand::Rng;

use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::providers::Provider;
use super::chunking::Chunk;

/// Retry ceiling and backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first
    pub max_attempts: u32,

    /// Base delay after a generic transient failure
    pub base_delay: Duration,

    /// Base delay after a rate-limit answer
    pub rate_limit_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            rate_limit_delay: Duration::from_millis(4000),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from configuration, clamping the attempt ceiling to 3..=5
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.clamp(3, 5),
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            rate_limit_delay: Duration::from_millis(config.rate_limit_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter: true,
        }
    }

    /// Policy with millisecond delays and no jitter, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            rate_limit_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
            jitter: false,
        }
    }

    /// Delay before the next attempt, after `failed_attempts` failures
    ///
    /// Doubles per failure and saturates at `max_delay`.
    pub fn backoff_delay(&self, failed_attempts: u32, rate_limited: bool) -> Duration {
        let base = if rate_limited { self.rate_limit_delay } else { self.base_delay };
        let exponent = failed_attempts.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << exponent).min(self.max_delay)
    }

    /// Apply jitter to a delay, staying under `max_delay`
    pub fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let spread = (delay.as_millis() as u64 / 4).max(1);
        let extra = rand::rng().random_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }
}

/// Lifecycle of one translation job
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Not attempted yet
    Pending,
    /// Failed `attempt` times, waiting `delay` before the next try
    Retrying {
        /// Failed attempts so far
        attempt: u32,
        /// Backoff before the next attempt, before jitter
        delay: Duration,
    },
    /// Translated text received
    Succeeded(String),
    /// Attempts exhausted, original text kept
    FallenBack(String),
}

impl JobState {
    /// Whether the job has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::FallenBack(_))
    }
}

/// One unit of work for the translation client
#[derive(Debug, Clone)]
pub struct TranslationJob {
    /// Chunk the text belongs to
    pub chunk_id: usize,
    /// Text sent to the endpoint
    pub text: String,
    /// Endpoint language code
    pub target_language: String,
    /// Attempts made so far
    pub attempt: u32,
    /// Current state
    pub state: JobState,
    /// Last failure seen, if any
    pub last_error: Option<ProviderError>,
}

impl TranslationJob {
    /// Create a pending job
    pub fn new(chunk_id: usize, text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            chunk_id,
            text: text.into(),
            target_language: target_language.into(),
            attempt: 0,
            state: JobState::Pending,
            last_error: None,
        }
    }

    /// Feed the result of one attempt and compute the next state
    pub fn advance(&mut self, result: Result<String, ProviderError>, policy: &RetryPolicy) -> &JobState {
        self.attempt += 1;

        let result = result.and_then(|translated| {
            if translated.trim().is_empty() && !self.text.trim().is_empty() {
                Err(ProviderError::ParseError("empty translation for non-empty input".to_string()))
            } else {
                Ok(translated)
            }
        });

        self.state = match result {
            Ok(translated) => JobState::Succeeded(translated),
            Err(e) => {
                let rate_limited = e.is_rate_limited();
                self.last_error = Some(e);
                if self.attempt >= policy.max_attempts {
                    JobState::FallenBack(self.text.clone())
                } else {
                    JobState::Retrying {
                        attempt: self.attempt,
                        delay: policy.backoff_delay(self.attempt, rate_limited),
                    }
                }
            },
        };

        &self.state
    }
}

/// Final result of one job
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationStatus {
    /// Endpoint answered
    Translated {
        /// Attempts it took
        attempts: u32,
    },
    /// Attempts exhausted; text is the original
    FallenBack {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },
}

impl TranslationStatus {
    /// Whether the text is still in the source language
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::FallenBack { .. })
    }
}

/// Text returned by the client, with how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    /// Translated text, or the original on fallback
    pub text: String,
    /// How the text was obtained
    pub status: TranslationStatus,
}

/// Calls one translation endpoint with retry and fallback
#[derive(Clone)]
pub struct TranslationClient {
    /// Endpoint implementation
    provider: Arc<dyn Provider>,

    /// Retry parameters
    policy: RetryPolicy,

    /// Minimum pause after every call
    pacing: Duration,

    /// Calls issued, shared across clones
    calls: Arc<AtomicUsize>,
}

impl TranslationClient {
    /// Create a client over a provider
    pub fn new(provider: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            pacing: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pause this long after each call
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Endpoint behind this client
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Retry parameters in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of endpoint calls issued so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Translate one chunk
    pub async fn translate(&self, chunk: &Chunk, target_language: &str) -> TranslationResult {
        self.translate_text(chunk.chunk_id, &chunk.text, target_language).await
    }

    /// Translate arbitrary text on behalf of a chunk
    pub async fn translate_text(&self, chunk_id: usize, text: &str, target_language: &str) -> TranslationResult {
        if text.trim().is_empty() {
            return TranslationResult {
                text: text.to_string(),
                status: TranslationStatus::Translated { attempts: 0 },
            };
        }

        let mut job = TranslationJob::new(chunk_id, text, target_language);
        self.run_job(&mut job).await;

        match job.state {
            JobState::Succeeded(translated) => TranslationResult {
                text: translated,
                status: TranslationStatus::Translated { attempts: job.attempt },
            },
            JobState::FallenBack(original) => {
                let last_error = job.last_error.map(|e| e.to_string()).unwrap_or_default();
                warn!("Chunk {} fell back to original text after {} attempt(s): {}", chunk_id, job.attempt, last_error);
                TranslationResult {
                    text: original,
                    status: TranslationStatus::FallenBack { attempts: job.attempt, last_error },
                }
            },
            JobState::Pending | JobState::Retrying { .. } => TranslationResult {
                text: job.text,
                status: TranslationStatus::FallenBack { attempts: job.attempt, last_error: "job did not finish".to_string() },
            },
        }
    }

    /// Drive a job to a terminal state
    async fn run_job(&self, job: &mut TranslationJob) {
        while !job.state.is_terminal() {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.provider.translate(&job.text, &job.target_language).await;

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let state = job.advance(result, &self.policy).clone();
            if let JobState::Retrying { attempt, delay } = state {
                let wait = self.policy.jittered(delay);
                debug!("Chunk {} attempt {} failed ({}), retrying in {:?}",
                       job.chunk_id, attempt,
                       job.last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                       wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

impl std::fmt::Debug for TranslationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationClient")
            .field("provider", &self.provider.name())
            .field("policy", &self.policy)
            .finish()
    }
}
