/*!
 * Bounded-concurrency chunk translation.
 *
 * Chunks are fanned out to the translation client with at most
 * `max_concurrent_requests` calls in flight. Each worker writes its outcome
 * into the slot of its chunk index, so output order never depends on which
 * call finishes first.
 */

use futures::stream::{self, StreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

use super::chunking::{Chunk, CHUNK_SEPARATOR};
use super::core::{TranslationClient, TranslationStatus};

// @const: Blank-line boundary between blocks in translated text
static SEGMENT_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n(?:[ \t]*\n)+").unwrap()
});

/// How a chunk's segments were obtained
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// One call translated the whole chunk
    Translated {
        /// Attempts it took
        attempts: u32,
    },
    /// The chunk response was misaligned, units were translated one by one
    Recovered {
        /// Units that fell back to the original text
        degraded_units: usize,
    },
    /// Attempts exhausted; segments are the original texts
    FallenBack {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },
}

/// Translated segments for one chunk, one per referenced block
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    /// Chunk this outcome belongs to
    pub chunk_id: usize,
    /// Translated text per source block, aligned with `Chunk::source_block_refs`
    pub segments: Vec<String>,
    /// How the segments were obtained
    pub status: ChunkStatus,
}

impl ChunkOutcome {
    /// Outcome that keeps the chunk's original text
    pub fn untranslated(chunk: &Chunk, reason: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            segments: split_units(chunk),
            status: ChunkStatus::FallenBack { attempts: 0, last_error: reason.into() },
        }
    }

    /// Whether any part of the chunk is still untranslated
    pub fn is_degraded(&self) -> bool {
        match &self.status {
            ChunkStatus::Translated { .. } => false,
            ChunkStatus::Recovered { degraded_units } => *degraded_units > 0,
            ChunkStatus::FallenBack { .. } => true,
        }
    }
}

/// Summary of a translation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationReport {
    /// Chunks processed
    pub chunks: usize,
    /// Chunks with at least some original-language text
    pub degraded_chunks: Vec<usize>,
    /// Chunks that needed per-unit recovery
    pub recovered_chunks: Vec<usize>,
    /// Endpoint calls issued
    pub calls: usize,
}

impl TranslationReport {
    /// Build a report from ordered outcomes
    pub fn from_outcomes(outcomes: &[ChunkOutcome], calls: usize) -> Self {
        Self {
            chunks: outcomes.len(),
            degraded_chunks: outcomes.iter().filter(|o| o.is_degraded()).map(|o| o.chunk_id).collect(),
            recovered_chunks: outcomes
                .iter()
                .filter(|o| matches!(o.status, ChunkStatus::Recovered { .. }))
                .map(|o| o.chunk_id)
                .collect(),
            calls,
        }
    }

    /// Whether every chunk was translated
    pub fn is_complete(&self) -> bool {
        self.degraded_chunks.is_empty()
    }
}

/// Batch translator for running many chunk translations
#[derive(Debug, Clone)]
pub struct BatchTranslator {
    /// Client that performs single translations
    client: TranslationClient,

    /// Maximum number of concurrent requests
    max_concurrent_requests: usize,

    /// Whether to retry individual units on a misaligned chunk response
    retry_individual_entries: bool,
}

impl BatchTranslator {
    /// Create a new batch translator
    pub fn new(client: TranslationClient, max_concurrent_requests: usize) -> Self {
        Self {
            client,
            max_concurrent_requests: max_concurrent_requests.max(1),
            retry_individual_entries: true,
        }
    }

    /// Enable or disable per-unit recovery
    pub fn with_individual_retry(mut self, enabled: bool) -> Self {
        self.retry_individual_entries = enabled;
        self
    }

    /// Client used by the workers
    pub fn client(&self) -> &TranslationClient {
        &self.client
    }

    /// Concurrency bound
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Translate all chunks, returning outcomes in chunk order
    pub async fn translate_chunks(&self, chunks: &[Chunk], target_language: &str) -> Vec<ChunkOutcome> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let start_time = Instant::now();
        let mut slots: Vec<Option<ChunkOutcome>> = vec![None; chunks.len()];

        let mut completions = stream::iter(0..chunks.len())
            .map(|slot| {
                let chunk = &chunks[slot];
                async move { (slot, self.translate_chunk(chunk, target_language).await) }
            })
            .buffer_unordered(self.max_concurrent_requests);

        while let Some((slot, outcome)) = completions.next().await {
            slots[slot] = Some(outcome);
        }

        debug!("Translated {} chunk(s) with concurrency {} in {:?}",
               chunks.len(), self.max_concurrent_requests, start_time.elapsed());

        slots
            .into_iter()
            .zip(chunks)
            .map(|(slot, chunk)| slot.unwrap_or_else(|| ChunkOutcome::untranslated(chunk, "worker did not report")))
            .collect()
    }

    /// Translate one chunk and align the response with its blocks
    async fn translate_chunk(&self, chunk: &Chunk, target_language: &str) -> ChunkOutcome {
        let result = self.client.translate(chunk, target_language).await;

        let attempts = match result.status {
            TranslationStatus::FallenBack { attempts, last_error } => {
                return ChunkOutcome {
                    chunk_id: chunk.chunk_id,
                    segments: split_units(chunk),
                    status: ChunkStatus::FallenBack { attempts, last_error },
                };
            },
            TranslationStatus::Translated { attempts } => attempts,
        };

        if !chunk.is_multi_unit() {
            return ChunkOutcome {
                chunk_id: chunk.chunk_id,
                segments: vec![tidy_segment(&result.text)],
                status: ChunkStatus::Translated { attempts },
            };
        }

        let segments = split_translated_segments(&result.text);
        if segments.len() == chunk.source_block_refs.len() {
            return ChunkOutcome {
                chunk_id: chunk.chunk_id,
                segments,
                status: ChunkStatus::Translated { attempts },
            };
        }

        warn!("Chunk {} came back with {} segment(s) for {} block(s)",
              chunk.chunk_id, segments.len(), chunk.source_block_refs.len());

        if !self.retry_individual_entries {
            return ChunkOutcome::untranslated(chunk, "misaligned response");
        }

        self.recover_units(chunk, target_language).await
    }

    /// Translate each unit of a chunk on its own
    async fn recover_units(&self, chunk: &Chunk, target_language: &str) -> ChunkOutcome {
        let units = split_units(chunk);
        let mut segments = Vec::with_capacity(units.len());
        let mut degraded_units = 0;

        for unit in &units {
            let result = self.client.translate_text(chunk.chunk_id, unit, target_language).await;
            if result.status.is_degraded() {
                degraded_units += 1;
            }
            segments.push(tidy_segment(&result.text));
        }

        ChunkOutcome {
            chunk_id: chunk.chunk_id,
            segments,
            status: ChunkStatus::Recovered { degraded_units },
        }
    }
}

/// Original block texts of a chunk
pub fn split_units(chunk: &Chunk) -> Vec<String> {
    chunk.text.split(CHUNK_SEPARATOR).map(str::to_string).collect()
}

/// Split translated chunk text at blank lines
pub fn split_translated_segments(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    SEGMENT_SEPARATOR_REGEX
        .split(&normalized)
        .map(tidy_segment)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Drop surrounding blank lines and trailing whitespace, keep leading indentation
fn tidy_segment(segment: &str) -> String {
    segment.trim_start_matches(['\n', '\r']).trim_end().to_string()
}
