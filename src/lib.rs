/*!
 * # Autotranslate - machine-translated subtitles for Stremio
 *
 * A Rust library and server that reads subtitles from Stremio subtitle
 * addons, translates them through a LibreTranslate-compatible endpoint and
 * serves the result as SRT.
 *
 * ## Features
 *
 * - Preferred-language selection across several upstream addons
 * - Block-aware chunking that never splits a subtitle cue
 * - Bounded-concurrency translation with retry, backoff and fallback
 * - Reassembly that keeps every original index and timing line
 * - Content-addressed cache with TTL and compute-once semantics
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_source`: Upstream listing, selection and download
 * - `subtitle_processor`: Subtitle block parsing and serialization
 * - `translation`: Translation pipeline:
 *   - `translation::chunking`: Block-aware chunking
 *   - `translation::core`: Retrying translation client
 *   - `translation::batch`: Concurrent chunk scheduling
 *   - `translation::reassembly`: Mapping translations back onto blocks
 *   - `translation::cache`: Translated document cache
 * - `app_controller`: Request orchestration
 * - `server`: HTTP addon endpoints
 * - `language_utils`: ISO language code utilities
 * - `providers`: Translation endpoint clients
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod subtitle_source;
pub mod subtitle_processor;
pub mod translation;
pub mod app_controller;
pub mod server;
pub mod language_utils;
pub mod providers;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, SubtitleDescriptor, SubtitleRequest};
pub use subtitle_processor::{Block, SubtitleDocument};
pub use translation::{DocumentCache, TranslatedDocument, TranslationPipeline};
pub use language_utils::{language_codes_match, normalize_to_part2t, get_language_name};
pub use errors::{AppError, CacheError, PipelineError, ProviderError, SourceError};
