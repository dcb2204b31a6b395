/*!
 * Document translation pipeline.
 *
 * Runs the stages in order for one parsed document:
 * 1. **Chunking**: group block text into size-bounded chunks
 * 2. **Translation**: fan chunks out through the batch translator
 * 3. **Reassembly**: put translated text back under the original timing
 *
 * The result always has the same number of blocks as the input. Chunks that
 * could not be translated keep their original text and are listed in the
 * report.
 */

use log::{info, warn};
use std::time::{Duration, Instant};

use crate::errors::PipelineError;
use crate::language_utils;
use crate::subtitle_processor::SubtitleDocument;

use super::batch::{BatchTranslator, TranslationReport};
use super::chunking::chunk_document;
use super::reassembly::reassemble;

/// Default chunk size limit, in characters
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1500;

/// A translated document with its report
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedDocument {
    /// Reassembled document
    pub document: SubtitleDocument,

    /// What happened to each chunk
    pub report: TranslationReport,

    /// Wall time of the translation pass
    pub elapsed: Duration,
}

/// Chunk, translate and reassemble subtitle documents
#[derive(Debug, Clone)]
pub struct TranslationPipeline {
    /// Scheduler over the translation client
    translator: BatchTranslator,

    /// Chunk size limit
    max_chunk_chars: usize,
}

impl TranslationPipeline {
    /// Create a pipeline
    pub fn new(translator: BatchTranslator, max_chunk_chars: usize) -> Self {
        Self {
            translator,
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    /// Scheduler in use
    pub fn translator(&self) -> &BatchTranslator {
        &self.translator
    }

    /// Translate a document into `target_language`
    ///
    /// `target_language` is a user-facing tag such as `pt-BR`; it is mapped
    /// to the code the endpoint understands before any call is made.
    pub async fn translate_document(
        &self,
        document: &SubtitleDocument,
        target_language: &str,
    ) -> Result<TranslatedDocument, PipelineError> {
        let start_time = Instant::now();
        let calls_before = self.translator.client().call_count();
        let endpoint_language = language_utils::endpoint_language_code(target_language);

        let chunks = chunk_document(document, self.max_chunk_chars);
        let outcomes = self.translator.translate_chunks(&chunks, &endpoint_language).await;
        let translated = reassemble(document, &chunks, &outcomes)?;

        let calls = self.translator.client().call_count().saturating_sub(calls_before);
        let report = TranslationReport::from_outcomes(&outcomes, calls);
        let elapsed = start_time.elapsed();

        if report.is_complete() {
            info!("Translated {} block(s) in {} chunk(s) to {} with {} call(s) in {:?}",
                  translated.len(), report.chunks, endpoint_language, report.calls, elapsed);
        } else {
            warn!("Translated {} block(s) to {} with {} of {} chunk(s) left in the original language",
                  translated.len(), endpoint_language, report.degraded_chunks.len(), report.chunks);
        }

        Ok(TranslatedDocument { document: translated, report, elapsed })
    }
}
