//! Local cache for model artifacts.
//!
//! `get_or_fetch(key)` returns a path to a local copy of the artifact,
//! fetching it at most once per key. Concurrent callers for the same key
//! wait on that key's slot while the first one fetches; cached keys and
//! other keys are never held up by an in-flight fetch. Entries not used for
//! longer than the TTL are dropped by [`ArtifactCache::evict_expired`],
//! which also deletes their files.
//!
//! The directory is the state: each cached artifact is the file `{dir}/{key}`
//! and its modification time is the last use. A cache opened on an existing
//! directory picks those files up, so reuse and eviction carry across
//! processes. Downloads land in a dot-prefixed `.part` file and are renamed
//! into place, so a failed fetch never leaves a partial artifact behind.

use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default time-to-live for unused entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key '{0}'")]
    InvalidKey(String),
    #[error("fetch failed for '{key}': {reason}")]
    Fetch { key: String, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads an artifact to a local path.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, key: &str, dest: &Path) -> Result<(), CacheError>;
}

/// Copies `{source}/{key}` into the cache. Stands in for remote storage.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    source: PathBuf,
}

impl DirFetcher {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Fetcher for DirFetcher {
    fn fetch(&self, key: &str, dest: &Path) -> Result<(), CacheError> {
        let src = self.source.join(key);
        std::fs::copy(&src, dest).map_err(|e| CacheError::Fetch {
            key: key.to_string(),
            reason: format!("{}: {e}", src.display()),
        })?;
        Ok(())
    }
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    last_used: SystemTime,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Mutex<Option<Entry>>,
}

impl Slot {
    fn with_entry(entry: Entry) -> Self {
        Self {
            entry: Mutex::new(Some(entry)),
        }
    }
}

pub struct ArtifactCache {
    dir: PathBuf,
    ttl: Duration,
    fetcher: Arc<dyn Fetcher>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ArtifactCache {
    /// Open a cache rooted at `dir` (created if missing) with the default TTL.
    /// Artifacts already in `dir` become entries, last used at their mtime.
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let mut slots = HashMap::new();
        for dirent in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let dirent = dirent.map_err(io_err(&dir))?;
            let Some(key) = dirent.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if validate_key(&key).is_err() {
                continue;
            }
            let path = dirent.path();
            let meta = dirent.metadata().map_err(io_err(&path))?;
            if !meta.is_file() {
                continue;
            }
            let last_used = meta.modified().unwrap_or_else(|_| SystemTime::now());
            slots.insert(key, Arc::new(Slot::with_entry(Entry { path, last_used })));
        }
        if !slots.is_empty() {
            info!(dir = %dir.display(), entries = slots.len(), "artifact cache opened");
        }

        Ok(Self {
            dir,
            ttl: DEFAULT_TTL,
            fetcher,
            slots: Mutex::new(slots),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Local path for `key`, fetching it first if it is not cached.
    pub fn get_or_fetch(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        loop {
            let slot = Arc::clone(lock(&self.slots).entry(key.to_string()).or_default());
            let mut entry = lock(&slot.entry);
            // Eviction or a failed fetch may have retired this slot while we waited.
            if !self.is_current(key, &slot) {
                continue;
            }

            if let Some(e) = entry.as_mut() {
                if e.path.is_file() {
                    e.last_used = touch(&e.path);
                    debug!(key, "artifact cache hit");
                    return Ok(e.path.clone());
                }
                warn!(key, path = %e.path.display(), "cached artifact missing on disk, fetching again");
                *entry = None;
            }

            let dest = self.dir.join(key);
            if dest.is_file() {
                debug!(key, "adopting artifact already on disk");
            } else if let Err(e) = self.download(key, &dest) {
                drop(entry);
                self.retire(key, &slot);
                return Err(e);
            }
            *entry = Some(Entry {
                last_used: touch(&dest),
                path: dest.clone(),
            });
            return Ok(dest);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let slot = lock(&self.slots).get(key).cloned();
        slot.map(|s| lock(&s.entry).is_some()).unwrap_or(false)
    }

    /// Number of fetched entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|s| lock(&s.entry).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries unused for at least the TTL and delete their files.
    /// Slots with a fetch in flight are skipped. Returns the number evicted.
    pub fn evict_expired(&self) -> Result<usize, CacheError> {
        let mut evicted = 0;
        let mut failure = None;
        let mut slots = lock(&self.slots);
        slots.retain(|key, slot| {
            let Ok(mut entry) = slot.entry.try_lock() else {
                return true;
            };
            let Some(e) = entry.as_ref() else {
                // Empty slot with nobody fetching.
                return false;
            };
            if e.last_used.elapsed().unwrap_or(Duration::ZERO) < self.ttl {
                return true;
            }
            // The file goes while the slot is still locked, so a caller for
            // the same key cannot adopt it halfway through removal.
            match std::fs::remove_file(&e.path) {
                Ok(()) => info!(key = %key, "evicted cached artifact"),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!(key = %key, path = %e.path.display(), "evicted artifact was already gone");
                }
                Err(source) => {
                    warn!(key = %key, error = %source, "could not remove expired artifact");
                    failure.get_or_insert(CacheError::Io {
                        path: e.path.clone(),
                        source,
                    });
                    return true;
                }
            }
            *entry = None;
            evicted += 1;
            false
        });
        drop(slots);

        match failure {
            Some(err) => Err(err),
            None => Ok(evicted),
        }
    }

    fn is_current(&self, key: &str, slot: &Arc<Slot>) -> bool {
        lock(&self.slots)
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    /// Remove `slot` from the map if it is still the one registered for `key`.
    fn retire(&self, key: &str, slot: &Arc<Slot>) {
        let mut slots = lock(&self.slots);
        if slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(key);
        }
    }

    /// Fetch into a temporary file, then rename it to `dest`.
    fn download(&self, key: &str, dest: &Path) -> Result<(), CacheError> {
        let part = self
            .dir
            .join(format!(".{key}.{}.part", std::process::id()));
        info!(key, dest = %dest.display(), "fetching artifact");
        let result = self
            .fetcher
            .fetch(key, &part)
            .and_then(|()| std::fs::rename(&part, dest).map_err(io_err(dest)));
        if result.is_err() {
            match std::fs::remove_file(&part) {
                Ok(()) => debug!(key, "removed partial download"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(key, path = %part.display(), error = %e, "could not remove partial download"),
            }
        }
        result
    }
}

/// Record a use of `path` by bumping its mtime. Returns the new last-use time.
fn touch(path: &Path) -> SystemTime {
    let now = SystemTime::now();
    let bumped = File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(now));
    if let Err(e) = bumped {
        warn!(path = %path.display(), error = %e, "could not record artifact use on disk");
    }
    now
}

/// Keys become file names, so they must be a single plain path component.
/// A leading dot is reserved for in-progress downloads.
fn validate_key(key: &str) -> Result<(), CacheError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}
