use crate::access::artifact::Artifact;
use crate::access::error::AccessError;
use polars::prelude::DataFrame;
use std::collections::{hash_map::Entry, HashMap};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// When a cached frame must be reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationPolicy {
    /// Frames stay cached until [`FrameCache::clear`].
    Never,
    /// Reload when the backing file's modification time changed or the file is gone.
    /// Frames built without a backing file stay cached.
    #[default]
    ModifiedTime,
    /// Reload once the entry is older than the given age.
    MaxAge(Duration),
}

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub artifact: Artifact,
    pub root: PathBuf,
}

impl CacheKey {
    pub fn new(artifact: Artifact, root: &Path) -> Self {
        Self {
            artifact,
            root: root.to_path_buf(),
        }
    }
}

/// A frame produced by a loader, with the file it was read from (if any).
#[derive(Debug, Clone)]
pub struct LoadedFrame {
    pub frame: DataFrame,
    pub source: Option<PathBuf>,
}

impl LoadedFrame {
    pub fn from_file(frame: DataFrame, source: PathBuf) -> Self {
        Self {
            frame,
            source: Some(source),
        }
    }

    pub fn built(frame: DataFrame) -> Self {
        Self {
            frame,
            source: None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    frame: DataFrame,
    source: Option<PathBuf>,
    modified: Option<SystemTime>,
    loaded_at: SystemTime,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Memoizes loaded frames per (artifact, root).
///
/// Loads run outside the lock, so concurrent callers may load the same artifact
/// twice; the first result inserted wins.
#[derive(Debug)]
pub struct FrameCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    policy: InvalidationPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(InvalidationPolicy::default())
    }
}

impl FrameCache {
    pub fn new(policy: InvalidationPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: InvalidationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    // A panic inside a loader never leaves the map half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.policy {
            InvalidationPolicy::Never => true,
            InvalidationPolicy::ModifiedTime => match &entry.source {
                Some(path) => {
                    let current = modified_time(path);
                    current.is_some() && current == entry.modified
                }
                None => true,
            },
            InvalidationPolicy::MaxAge(max_age) => self
                .clock
                .now()
                .duration_since(entry.loaded_at)
                .map(|age| age <= max_age)
                .unwrap_or(true),
        }
    }

    /// The cached frame for `key`, or the result of `load` (which is then cached).
    pub fn get_or_load<F>(&self, key: CacheKey, load: F) -> Result<DataFrame, AccessError>
    where
        F: FnOnce() -> Result<LoadedFrame, AccessError>,
    {
        {
            let cache = self.lock();
            if let Some(entry) = cache.get(&key) {
                if self.is_fresh(entry) {
                    log::debug!("Cache hit for {}", key.artifact);
                    return Ok(entry.frame.clone());
                }
                log::info!("Cached {} is stale, reloading", key.artifact);
            }
        }

        let loaded = load()?;
        let entry = CacheEntry {
            modified: loaded.source.as_deref().and_then(modified_time),
            source: loaded.source,
            frame: loaded.frame,
            loaded_at: self.clock.now(),
        };

        let mut cache = self.lock();
        match cache.entry(key) {
            Entry::Occupied(occupied) if self.is_fresh(occupied.get()) => {
                Ok(occupied.get().frame.clone())
            }
            Entry::Occupied(mut occupied) => {
                let frame = entry.frame.clone();
                occupied.insert(entry);
                Ok(frame)
            }
            Entry::Vacant(vacant) => {
                let frame = entry.frame.clone();
                vacant.insert(entry);
                Ok(frame)
            }
        }
    }

    /// Drops every cached frame of `artifact`, whatever its root.
    pub fn invalidate(&self, artifact: Artifact) {
        self.lock().retain(|key, _| key.artifact != artifact);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
