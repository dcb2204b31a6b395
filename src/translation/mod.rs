/*!
 * Subtitle translation engine.
 *
 * This module turns a parsed subtitle document into a translated one. It is
 * split into several submodules:
 *
 * - `chunking`: Block-aware grouping of text into size-bounded chunks
 * - `core`: Translation client with retry, backoff and fallback
 * - `batch`: Bounded-concurrency scheduling of chunk translations
 * - `reassembly`: Re-attaching translated text to the original structure
 * - `cache`: Fingerprinted TTL cache with single-flight computation
 * - `pipeline`: The stages above wired together for one document
 */

// Re-export main types for easier usage
pub use self::batch::{BatchTranslator, ChunkOutcome, ChunkStatus, TranslationReport};
pub use self::cache::{fingerprint, CacheEntry, DocumentCache};
pub use self::chunking::{chunk_document, Chunk};
pub use self::core::{RetryPolicy, TranslationClient};
pub use self::pipeline::{TranslatedDocument, TranslationPipeline};

// Submodules
pub mod batch;
pub mod cache;
pub mod chunking;
pub mod core;
pub mod pipeline;
pub mod reassembly;
