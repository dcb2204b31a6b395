/*!
 * Translated document caching.
 *
 * This module keeps finished documents keyed by a fingerprint of
 * (source identifier, target language, upstream set) so that repeated
 * requests skip the upstream fetch and the translation pass.
 *
 * Storage is pluggable (`MemoryStore` or `DiskStore`). On top of it,
 * `DocumentCache::compute_once` guarantees that at most one producer runs per
 * fingerprint at any time; concurrent callers wait for and share its result.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::app_config::{CacheBackend, CacheConfig};
use crate::errors::CacheError;

/// A finished document stored under its fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key
    pub fingerprint: String,

    /// Serialized SRT text
    pub document: String,

    /// When the entry was produced
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(fingerprint: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            document: document.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the entry is at least `ttl` old at `now`
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age >= ttl,
            Err(_) => false,
        }
    }
}

/// Storage backend for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Read an entry, `None` when absent
    async fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace an entry
    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Drop an entry if present
    async fn remove(&self, fingerprint: &str) -> Result<(), CacheError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().get(fingerprint).cloned())
    }

    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.write().insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<(), CacheError> {
        self.entries.write().remove(fingerprint);
        Ok(())
    }
}

/// One JSON file per entry under a directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        match tokio::fs::read_to_string(self.entry_path(fingerprint)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write aside and rename so readers never see a partial file
        let path = self.entry_path(&entry.fingerprint);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec(entry)?).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.entry_path(fingerprint)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

type Flight = Arc<OnceCell<Option<Arc<CacheEntry>>>>;

/// TTL cache of translated documents with a per-fingerprint computation guard
pub struct DocumentCache {
    /// Backing storage
    store: Arc<dyn CacheStore>,

    /// Entries at least this old are treated as absent
    ttl: Duration,

    /// Computations currently running, by fingerprint
    inflight: Mutex<HashMap<String, Flight>>,

    /// Lookups answered from storage
    hits: AtomicUsize,

    /// Producer runs
    misses: AtomicUsize,
}

impl DocumentCache {
    /// Create a cache over a store
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// In-memory cache
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), ttl)
    }

    /// Build the cache described by the configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = config.ttl();
        match config.backend {
            CacheBackend::Memory => Self::in_memory(ttl),
            CacheBackend::Disk => {
                let dir = config.resolved_directory();
                debug!("Using disk cache at {:?}", dir);
                Self::new(Arc::new(DiskStore::new(dir)), ttl)
            },
        }
    }

    /// Time-to-live of entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry
    ///
    /// Expired entries are removed and reported as absent. Storage errors are
    /// logged and reported as absent as well.
    pub async fn get(&self, fingerprint: &str) -> Option<Arc<CacheEntry>> {
        if !is_valid_fingerprint(fingerprint) {
            return None;
        }

        let entry = match self.store.load(fingerprint).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("Cache read failed for {}: {}", fingerprint, e);
                return None;
            },
        };

        if entry.is_expired_at(self.ttl, Utc::now()) {
            debug!("Cache entry {} expired", fingerprint);
            if let Err(e) = self.store.remove(fingerprint).await {
                warn!("Failed to remove expired cache entry {}: {}", fingerprint, e);
            }
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(Arc::new(entry))
    }

    /// Insert or replace the document for a fingerprint
    pub async fn put(&self, fingerprint: &str, document: impl Into<String>) -> Result<Arc<CacheEntry>, CacheError> {
        let entry = CacheEntry::new(fingerprint, document);
        self.store.store(&entry).await?;
        debug!("Cached document {} ({} bytes)", fingerprint, entry.document.len());
        Ok(Arc::new(entry))
    }

    /// Return the cached document or run `producer` to make it
    ///
    /// At most one producer runs per fingerprint; callers arriving while it
    /// runs wait and receive the same entry. A producer returning `None` or a
    /// blank document caches nothing, so the next call tries again.
    pub async fn compute_once<F, Fut>(&self, fingerprint: &str, producer: F) -> Option<Arc<CacheEntry>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        if let Some(entry) = self.get(fingerprint).await {
            return Some(entry);
        }

        let flight = {
            let mut inflight = self.inflight.lock();
            inflight
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = flight
            .get_or_init(|| async {
                // A flight that finished just before ours may have stored it
                if let Some(entry) = self.get(fingerprint).await {
                    return Some(entry);
                }

                self.misses.fetch_add(1, Ordering::Relaxed);
                let document = producer().await.filter(|d| !d.trim().is_empty())?;

                match self.put(fingerprint, document.clone()).await {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Failed to store cache entry {}: {}", fingerprint, e);
                        Some(Arc::new(CacheEntry::new(fingerprint, document)))
                    },
                }
            })
            .await
            .clone();

        {
            let mut inflight = self.inflight.lock();
            if inflight.get(fingerprint).is_some_and(|current| Arc::ptr_eq(current, &flight)) {
                inflight.remove(fingerprint);
            }
        }

        result
    }

    /// Cache statistics as (hits, producer runs)
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

impl Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Deterministic cache key for a source, target language and upstream set
///
/// Upstreams are compared as a set: order and duplicates do not matter.
/// Fields are length-prefixed so no two inputs share a preimage.
pub fn fingerprint(source_id: &str, target_language: &str, upstreams: &[String]) -> String {
    let mut upstreams: Vec<&str> = upstreams.iter().map(|u| u.trim_end_matches('/')).collect();
    upstreams.sort_unstable();
    upstreams.dedup();

    let mut hasher = Sha256::new();
    for part in [source_id, target_language].into_iter().chain(upstreams) {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Whether `value` looks like a key produced by `fingerprint`
pub fn is_valid_fingerprint(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
