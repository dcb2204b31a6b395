use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::AppError;
use crate::language_utils;
use crate::providers::libretranslate::LibreTranslate;
use crate::providers::Provider;
use crate::subtitle_processor::SubtitleDocument;
use crate::subtitle_source::{self, StremioAddonSource, SubtitleSource};
use crate::translation::cache::{self, CacheEntry, DocumentCache};
use crate::translation::{BatchTranslator, RetryPolicy, TranslatedDocument, TranslationClient, TranslationPipeline};

// @module: Application controller for subtitle requests

/// What a client asked for
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRequest {
    /// Stremio content type (`movie`, `series`)
    pub media_type: String,

    /// Media identifier (`tt0111161`, `tt0903747:1:2`)
    pub media_id: String,

    /// User-facing target language tag
    pub target_language: String,

    /// Upstream base URLs to read from
    pub upstreams: Vec<String>,
}

impl SubtitleRequest {
    /// Identifier of the source subtitle, part of the cache key
    pub fn source_id(&self) -> String {
        format!("{}:{}", self.media_type, self.media_id)
    }

    /// Cache key for this request
    pub fn fingerprint(&self) -> String {
        cache::fingerprint(&self.source_id(), &self.target_language, &self.upstreams)
    }
}

/// Subtitle entry returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleDescriptor {
    /// Stable identifier
    pub id: String,

    /// Language tag of the translated file
    pub lang: String,

    /// Where the translated SRT is served
    pub url: String,
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Upstream subtitle source
    source: Arc<dyn SubtitleSource>,

    // @field: Chunk/translate/reassemble stages
    pipeline: TranslationPipeline,

    // @field: Translated document cache
    cache: Arc<DocumentCache>,

    // @field: Budget for producing one document
    request_timeout: Duration,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let provider = LibreTranslate::new(
            config.translation.endpoint.clone(),
            config.translation.get_api_key(),
            config.translation.request_timeout(),
        );
        let source = StremioAddonSource::from_config(&config.source);
        let cache = DocumentCache::from_config(&config.cache);

        Ok(Self::with_components(config, Arc::new(source), Arc::new(provider), Arc::new(cache)))
    }

    /// Assemble a controller from explicit parts
    pub fn with_components(
        config: Config,
        source: Arc<dyn SubtitleSource>,
        provider: Arc<dyn Provider>,
        cache: Arc<DocumentCache>,
    ) -> Self {
        let client = TranslationClient::new(provider, RetryPolicy::from_config(&config.translation))
            .with_pacing(config.translation.pacing());
        let translator = BatchTranslator::new(client, config.translation.optimal_concurrent_requests());
        let pipeline = TranslationPipeline::new(translator, config.translation.max_chars_per_request);
        let request_timeout = config.server.request_timeout();

        Self { config, source, pipeline, cache, request_timeout }
    }

    /// Replace the translation pipeline, e.g. to change the retry policy
    pub fn with_pipeline(mut self, pipeline: TranslationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Override the per-request budget
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Document cache in use
    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// Pipeline in use
    pub fn pipeline(&self) -> &TranslationPipeline {
        &self.pipeline
    }

    /// Translated subtitles for a request, empty when none can be produced
    ///
    /// Repeated and concurrent requests for the same fingerprint share one
    /// fetch and one translation pass. No failure escapes: a missing source,
    /// a download error, an unparsable file or an exceeded budget all yield
    /// an empty list.
    pub async fn subtitles_for(&self, request: &SubtitleRequest, base_url: &str) -> Vec<SubtitleDescriptor> {
        if request.upstreams.is_empty() {
            debug!("No upstream configured for {}", request.source_id());
            return Vec::new();
        }

        let fingerprint = request.fingerprint();
        let computation = self.cache.compute_once(&fingerprint, move || async move {
            match self.produce_document(request).await {
                Ok(document) => document,
                Err(e) => {
                    warn!("No subtitle for {} ({}): {}", request.source_id(), request.target_language, e);
                    None
                },
            }
        });

        let entry = match tokio::time::timeout(self.request_timeout, computation).await {
            Ok(entry) => entry,
            Err(_) => {
                warn!("Gave up on {} ({}) after {:?}", request.source_id(), request.target_language, self.request_timeout);
                None
            },
        };

        match entry {
            Some(entry) => vec![Self::descriptor(request, &entry, base_url)],
            None => Vec::new(),
        }
    }

    /// Cached SRT text for a fingerprint, if still live
    pub async fn cached_subtitle(&self, fingerprint: &str) -> Option<Arc<CacheEntry>> {
        self.cache.get(fingerprint).await
    }

    /// Fetch, parse and translate the preferred upstream subtitle
    ///
    /// `Ok(None)` means the upstream file held no cues.
    pub async fn produce_document(&self, request: &SubtitleRequest) -> Result<Option<String>, AppError> {
        let raw = subtitle_source::fetch_preferred_subtitle(
            self.source.as_ref(),
            &request.media_type,
            &request.media_id,
            &request.upstreams,
        ).await?;

        let document = SubtitleDocument::parse(&raw);
        if document.is_empty() {
            warn!("Subtitle for {} has no usable cues", request.source_id());
            return Ok(None);
        }

        let translated = self.pipeline.translate_document(&document, &request.target_language).await?;
        Self::log_report(&request.source_id(), &translated);

        Ok(Some(translated.document.to_srt()))
    }

    /// Translate a local subtitle file without touching the cache
    pub async fn translate_file(&self, input: &Path, target_language: &str) -> Result<TranslatedDocument, AppError> {
        let bytes = tokio::fs::read(input).await
            .map_err(|e| AppError::File(format!("{}: {}", input.display(), e)))?;
        let raw = subtitle_source::decode_subtitle_bytes(&bytes)?;

        let document = SubtitleDocument::parse(&raw);
        if document.is_empty() {
            return Err(AppError::File(format!("{}: no subtitle cues found", input.display())));
        }

        let target_language = language_utils::normalize_language_tag(target_language)
            .map_err(|e| AppError::Config(e.to_string()))?;

        let translated = self.pipeline.translate_document(&document, &target_language).await?;
        Self::log_report(&input.display().to_string(), &translated);
        Ok(translated)
    }

    fn descriptor(request: &SubtitleRequest, entry: &CacheEntry, base_url: &str) -> SubtitleDescriptor {
        SubtitleDescriptor {
            id: format!("{}-{}-autotranslate", request.media_id, request.target_language),
            lang: request.target_language.clone(),
            url: format!("{}/subs/{}.srt", base_url.trim_end_matches('/'), entry.fingerprint),
        }
    }

    fn log_report(subject: &str, translated: &TranslatedDocument) {
        let report = &translated.report;
        if report.is_complete() {
            info!("{}: {} chunk(s) translated", subject, report.chunks);
        } else {
            warn!("{}: chunk(s) {:?} kept the original text", subject, report.degraded_chunks);
        }
        if !report.recovered_chunks.is_empty() {
            debug!("{}: chunk(s) {:?} were translated unit by unit", subject, report.recovered_chunks);
        }
    }
}
