/*!
 * Upstream subtitle source.
 *
 * Lists subtitle candidates for a media id across a set of Stremio subtitle
 * addons, picks the preferred one (English first, else the first listed) and
 * downloads it as text. Payloads may be gzip-compressed, carry a byte-order
 * mark, or be Latin-1 encoded; all of that is handled before parsing.
 */

use async_trait::async_trait;
use encoding_rs::{Encoding, WINDOWS_1252};
use flate2::read::GzDecoder;
use futures::future::join_all;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::app_config::SourceConfig;
use crate::errors::SourceError;
use crate::language_utils;

/// Language preferred as translation input
pub const PREFERRED_SOURCE_LANGUAGE: &str = "en";

/// Largest subtitle payload accepted, before and after gzip inflation
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// One subtitle offered by an upstream addon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubtitleCandidate {
    /// Upstream identifier
    #[serde(default)]
    pub id: String,

    /// Language tag as reported upstream (`en`, `eng`, `pt-BR`...)
    #[serde(default)]
    pub lang: String,

    /// Download URL
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SubtitleListing {
    #[serde(default)]
    subtitles: Vec<SubtitleCandidate>,
}

/// Source of raw subtitle text
#[async_trait]
pub trait SubtitleSource: Send + Sync + Debug {
    /// Candidates for a media item across all upstreams, in upstream order
    ///
    /// Failing upstreams are skipped; an empty list means nothing was found.
    async fn list_candidates(
        &self,
        media_type: &str,
        media_id: &str,
        upstreams: &[String],
    ) -> Vec<SubtitleCandidate>;

    /// Download and decode one subtitle file
    async fn download(&self, url: &str) -> Result<String, SourceError>;
}

/// Pick the candidate to translate: the first English one, else the first
/// one with a download URL
pub fn select_preferred(candidates: &[SubtitleCandidate]) -> Option<&SubtitleCandidate> {
    let usable = || candidates.iter().filter(|c| !c.url.trim().is_empty());

    usable()
        .find(|c| language_codes_match_loose(&c.lang, PREFERRED_SOURCE_LANGUAGE))
        .or_else(|| usable().next())
}

// Upstreams label languages inconsistently (`en`, `eng`, `English`)
fn language_codes_match_loose(lang: &str, preferred: &str) -> bool {
    language_utils::language_codes_match(lang, preferred)
        || lang.trim().to_lowercase().starts_with(preferred)
}

/// List, select and download in one go
pub async fn fetch_preferred_subtitle(
    source: &dyn SubtitleSource,
    media_type: &str,
    media_id: &str,
    upstreams: &[String],
) -> Result<String, SourceError> {
    let candidates = source.list_candidates(media_type, media_id, upstreams).await;
    let chosen = select_preferred(&candidates)
        .ok_or_else(|| SourceError::NotFound(format!("{}/{}", media_type, media_id)))?;

    debug!("Selected subtitle {} ({}) out of {} candidate(s)",
           chosen.id, chosen.lang, candidates.len());

    source.download(&chosen.url).await
}

/// HTTP client for Stremio subtitle addons
#[derive(Debug, Clone)]
pub struct StremioAddonSource {
    client: Client,
    listing_timeout: Duration,
    download_timeout: Duration,
    max_payload_bytes: usize,
}

impl StremioAddonSource {
    /// Create a source with explicit timeouts
    pub fn new(user_agent: &str, listing_timeout: Duration, download_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_default(),
            listing_timeout,
            download_timeout,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }

    /// Cap the size of downloaded and inflated payloads
    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Create a source from configuration
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.listing_timeout_secs),
            Duration::from_secs(config.download_timeout_secs),
        )
    }

    async fn list_from(&self, base: &str, media_type: &str, media_id: &str) -> Result<Vec<SubtitleCandidate>, String> {
        let url = listing_url(base, media_type, media_id)?;

        let response = self.client.get(url.clone())
            .timeout(self.listing_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let listing: SubtitleListing = response.json().await.map_err(|e| e.to_string())?;
        debug!("{} listed {} subtitle(s)", url, listing.subtitles.len());
        Ok(listing.subtitles)
    }
}

#[async_trait]
impl SubtitleSource for StremioAddonSource {
    async fn list_candidates(
        &self,
        media_type: &str,
        media_id: &str,
        upstreams: &[String],
    ) -> Vec<SubtitleCandidate> {
        let listings = join_all(
            upstreams.iter().map(|base| self.list_from(base, media_type, media_id)),
        ).await;

        listings
            .into_iter()
            .zip(upstreams)
            .flat_map(|(listing, base)| match listing {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Upstream {} failed to list subtitles: {}", base, e);
                    Vec::new()
                },
            })
            .collect()
    }

    async fn download(&self, url: &str) -> Result<String, SourceError> {
        let failed = |reason: String| SourceError::DownloadFailed { url: url.to_string(), reason };

        let mut response = self.client.get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let too_large = || failed(format!("payload exceeds {} bytes", self.max_payload_bytes));
        if response.content_length().is_some_and(|len| len > self.max_payload_bytes as u64) {
            return Err(too_large());
        }

        // Content-Length may be missing or wrong, so count while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            if body.len() + chunk.len() > self.max_payload_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} byte(s) from {}", body.len(), url);
        decode_subtitle_bytes_limited(&body, self.max_payload_bytes)
    }
}

/// In-memory source serving fixed candidates and files
///
/// Counts listing and download calls across clones, which makes it handy to
/// check how often the upstream was hit.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<SubtitleCandidate>,
    files: HashMap<String, String>,
    delay: Option<Duration>,
    listings: Arc<AtomicUsize>,
    downloads: Arc<AtomicUsize>,
}

impl StaticSource {
    /// Source offering one English subtitle with the given content
    pub fn single(content: impl Into<String>) -> Self {
        Self::default().with_file("en", "https://static.example/en.srt", content)
    }

    /// Add a candidate and the file behind it
    pub fn with_file(mut self, lang: &str, url: &str, content: impl Into<String>) -> Self {
        self.candidates.push(SubtitleCandidate {
            id: format!("static-{}", self.candidates.len()),
            lang: lang.to_string(),
            url: url.to_string(),
        });
        self.files.insert(url.to_string(), content.into());
        self
    }

    /// Add latency to every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Listing calls so far
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Download calls so far
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SubtitleSource for StaticSource {
    async fn list_candidates(&self, _media_type: &str, _media_id: &str, upstreams: &[String]) -> Vec<SubtitleCandidate> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if upstreams.is_empty() {
            return Vec::new();
        }
        self.candidates.clone()
    }

    async fn download(&self, url: &str) -> Result<String, SourceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.files.get(url).cloned().ok_or_else(|| SourceError::DownloadFailed {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }
}

/// `<base>/subtitles/<type>/<id>.json` with each segment percent-encoded
pub fn listing_url(base: &str, media_type: &str, media_id: &str) -> Result<Url, String> {
    let mut url = Url::parse(base.trim_end_matches('/')).map_err(|e| format!("invalid upstream {}: {}", base, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("upstream {} cannot be a base URL", base))?
        .pop_if_empty()
        .extend(["subtitles", media_type, &format!("{}.json", media_id)]);
    Ok(url)
}

/// Turn a downloaded payload into text
///
/// Gzip payloads are inflated first. A UTF-8 or UTF-16 byte-order mark
/// selects the encoding and is dropped; otherwise the bytes are read as UTF-8
/// and re-read as Windows-1252 (a Latin-1 superset) if that produced
/// replacement characters.
pub fn decode_subtitle_bytes(bytes: &[u8]) -> Result<String, SourceError> {
    decode_subtitle_bytes_limited(bytes, MAX_PAYLOAD_BYTES)
}

/// Same as [`decode_subtitle_bytes`], refusing gzip payloads that inflate
/// past `max_bytes`
pub fn decode_subtitle_bytes_limited(bytes: &[u8], max_bytes: usize) -> Result<String, SourceError> {
    let inflated;
    let bytes = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut buffer = Vec::new();
        GzDecoder::new(bytes)
            .take(max_bytes as u64 + 1)
            .read_to_end(&mut buffer)
            .map_err(|e| SourceError::Decode(format!("gzip: {}", e)))?;
        if buffer.len() > max_bytes {
            return Err(SourceError::Decode(format!("gzip: inflates past {} bytes", max_bytes)));
        }
        inflated = buffer;
        inflated.as_slice()
    } else {
        bytes
    };

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Ok(text.into_owned());
    }

    let text = String::from_utf8_lossy(bytes);
    if text.contains('\u{FFFD}') {
        debug!("Payload is not valid UTF-8, decoding as Windows-1252");
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        return Ok(text.into_owned());
    }

    Ok(text.into_owned())
}
