//! Artifact cache: single fetch under contention, TTL eviction, file removal,
//! state carried across cache instances through the directory.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgelab_runner::{ArtifactCache, CacheError, Fetcher};

/// Slow fetcher that records how many downloads happened.
#[derive(Default)]
struct SlowFetcher {
    calls: AtomicUsize,
}

impl Fetcher for SlowFetcher {
    fn fetch(&self, key: &str, dest: &Path) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(dest, key).map_err(|source| CacheError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

#[test]
fn concurrent_callers_share_one_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());
    let cache = ArtifactCache::new(dir.path(), fetcher.clone()).unwrap();

    let paths: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| cache.get_or_fetch("shared-model").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.len(), 1);
}

#[test]
fn distinct_keys_fetch_independently() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());
    let cache = ArtifactCache::new(dir.path(), fetcher.clone()).unwrap();

    std::thread::scope(|s| {
        for key in ["a", "b", "c"] {
            let cache = &cache;
            s.spawn(move || cache.get_or_fetch(key).unwrap());
        }
    });

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 3);
}

#[test]
fn expired_entries_are_evicted_and_files_removed() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());
    let cache = ArtifactCache::new(dir.path(), fetcher.clone())
        .unwrap()
        .with_ttl(Duration::ZERO);

    let a = cache.get_or_fetch("a").unwrap();
    let b = cache.get_or_fetch("b").unwrap();
    assert!(a.exists() && b.exists());

    assert_eq!(cache.evict_expired().unwrap(), 2);
    assert!(!a.exists());
    assert!(!b.exists());
    assert!(cache.is_empty());

    // Evicted keys are fetched again on demand.
    cache.get_or_fetch("a").unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn eviction_ignores_already_deleted_files() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::new(dir.path(), Arc::new(SlowFetcher::default()))
        .unwrap()
        .with_ttl(Duration::ZERO);

    let path = cache.get_or_fetch("gone").unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cache.evict_expired().unwrap(), 1);
    assert!(!cache.contains("gone"));
}

#[test]
fn fresh_entries_survive_eviction() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::new(dir.path(), Arc::new(SlowFetcher::default()))
        .unwrap()
        .with_ttl(Duration::from_secs(3600));

    let path = cache.get_or_fetch("fresh").unwrap();
    assert_eq!(cache.evict_expired().unwrap(), 0);
    assert!(path.exists());
    assert!(cache.contains("fresh"));
}

// ── State on disk ──

#[test]
fn reopened_cache_reuses_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());

    let first = ArtifactCache::new(dir.path(), fetcher.clone()).unwrap();
    let path = first.get_or_fetch("model.json").unwrap();
    drop(first);

    let second = ArtifactCache::new(dir.path(), fetcher.clone()).unwrap();
    assert!(second.contains("model.json"));
    assert_eq!(second.get_or_fetch("model.json").unwrap(), path);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn reopened_cache_evicts_stale_files() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());

    let path = ArtifactCache::new(dir.path(), fetcher.clone())
        .unwrap()
        .get_or_fetch("model.json")
        .unwrap();

    let reopened = ArtifactCache::new(dir.path(), fetcher.clone())
        .unwrap()
        .with_ttl(Duration::ZERO);
    assert_eq!(reopened.evict_expired().unwrap(), 1);
    assert!(!path.exists());

    let third = ArtifactCache::new(dir.path(), fetcher.clone()).unwrap();
    assert!(third.is_empty());
    third.get_or_fetch("model.json").unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn use_refreshes_file_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(SlowFetcher::default());
    let cache = ArtifactCache::new(dir.path(), fetcher).unwrap();
    let path = cache.get_or_fetch("model.json").unwrap();

    let old = std::time::SystemTime::now() - Duration::from_secs(48 * 3600);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(old)
        .unwrap();

    cache.get_or_fetch("model.json").unwrap();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert!(modified.elapsed().unwrap() < Duration::from_secs(3600));

    // A fresh process sees the refreshed time and keeps the file.
    let reopened = ArtifactCache::new(dir.path(), Arc::new(SlowFetcher::default())).unwrap();
    assert_eq!(reopened.evict_expired().unwrap(), 0);
    assert!(path.exists());
}
