/*!
 * Tests for the translated document cache
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use autotranslate::app_config::{CacheBackend, CacheConfig};
use autotranslate::translation::cache::{DiskStore, DocumentCache, fingerprint, is_valid_fingerprint};

use crate::common::{SAMPLE_SRT, create_temp_dir};

fn upstreams(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_fingerprint_withSameInputs_shouldBeStable() {
    let a = fingerprint("movie:tt1", "pt-BR", &upstreams(&["https://a.example", "https://b.example"]));
    let b = fingerprint("movie:tt1", "pt-BR", &upstreams(&["https://b.example/", "https://a.example"]));

    assert_eq!(a, b);
    assert!(is_valid_fingerprint(&a));
}

#[test]
fn test_fingerprint_withDifferentInputs_shouldDiffer() {
    let base = fingerprint("movie:tt1", "pt-BR", &upstreams(&["https://a.example"]));

    assert_ne!(base, fingerprint("movie:tt2", "pt-BR", &upstreams(&["https://a.example"])));
    assert_ne!(base, fingerprint("movie:tt1", "es", &upstreams(&["https://a.example"])));
    assert_ne!(base, fingerprint("movie:tt1", "pt-BR", &upstreams(&["https://c.example"])));
}

#[tokio::test]
async fn test_compute_once_withManyCallers_shouldRunProducerOnce() {
    let cache = Arc::new(DocumentCache::in_memory(Duration::from_secs(60)));
    let runs = Arc::new(AtomicUsize::new(0));
    let key = fingerprint("movie:tt1", "es", &upstreams(&["https://a.example"]));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let runs = runs.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .compute_once(&key, move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Some(SAMPLE_SRT.to_string())
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        let entry = task.await.unwrap().unwrap();
        assert_eq!(entry.document, SAMPLE_SRT);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_withExpiredEntry_shouldMiss() {
    let cache = DocumentCache::in_memory(Duration::from_millis(20));
    let key = fingerprint("movie:tt1", "es", &upstreams(&["https://a.example"]));

    cache.put(&key, SAMPLE_SRT).await.unwrap();
    assert!(cache.get(&key).await.is_some());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(cache.get(&key).await.is_none());
}

#[tokio::test]
async fn test_disk_cache_withNewInstance_shouldServePreviousEntries() {
    let dir = create_temp_dir().unwrap();
    let config = CacheConfig {
        backend: CacheBackend::Disk,
        directory: Some(dir.path().to_path_buf()),
        ttl_hours: 1,
    };
    let key = fingerprint("series:tt2:1:3", "fr", &upstreams(&["https://a.example"]));

    DocumentCache::from_config(&config).put(&key, SAMPLE_SRT).await.unwrap();
    assert!(dir.path().join(format!("{}.json", key)).exists());

    let reopened = DocumentCache::new(Arc::new(DiskStore::new(dir.path())), Duration::from_secs(3600));
    let entry = reopened.get(&key).await.unwrap();
    assert_eq!(entry.document, SAMPLE_SRT);
}

#[tokio::test]
async fn test_get_withPathLikeKey_shouldMiss() {
    let dir = create_temp_dir().unwrap();
    let cache = DocumentCache::new(Arc::new(DiskStore::new(dir.path())), Duration::from_secs(60));

    assert!(cache.get("../../etc/passwd").await.is_none());
}
