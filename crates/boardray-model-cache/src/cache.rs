//! The model cache.
//!
//! Lookups go memory first, then disk, then importer:
//!
//! 1. the in-memory map, keyed by normalized source path (re-validated
//!    against the source modification time);
//! 2. an on-disk blob `<sha1>.3dc` in the cache directory, reused when it
//!    is at least as new as the source and records the same hash;
//! 3. the first registered importer accepting the file. Its result is
//!    written back to disk.
//!
//! Concurrent loads of one path share a single import: every caller waits
//! on the same [`OnceLock`] slot.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CacheError, ImportError, Result};
use crate::hash::ContentHash;
use crate::importer::{ImporterRegistry, ModelImporter};
use crate::scene::{RenderModel, SceneGraph};

/// File extension of cache blobs.
pub const CACHE_EXTENSION: &str = "3dc";

const BLOB_FORMAT: u32 = 1;

/// One cached model.
#[derive(Debug)]
pub struct CacheEntry {
    source: PathBuf,
    hash: ContentHash,
    modified: Option<SystemTime>,
    scene: SceneGraph,
    render: OnceLock<Arc<RenderModel>>,
}

impl CacheEntry {
    /// Normalized source path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Content hash of the source at load time.
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Source modification time at load time.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Parsed scene graph.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Flattened model, built on first use.
    pub fn render_model(&self) -> Arc<RenderModel> {
        Arc::clone(
            self.render
                .get_or_init(|| Arc::new(RenderModel::from_scene(&self.scene))),
        )
    }
}

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Importer invocations that succeeded.
    pub imports: u64,
    /// Loads served from a disk blob.
    pub disk_hits: u64,
    /// Loads served from memory.
    pub memory_hits: u64,
    /// Loads that produced no model.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    imports: AtomicU64,
    disk_hits: AtomicU64,
    memory_hits: AtomicU64,
    failures: AtomicU64,
}

type Slot = Arc<OnceLock<Option<Arc<CacheEntry>>>>;

#[derive(Serialize, Deserialize)]
struct CacheBlob {
    format: u32,
    hash: String,
    scene: SceneGraph,
}

/// Content-addressed model store shared by every reload.
#[derive(Debug)]
pub struct ModelCache {
    cache_dir: OnceLock<PathBuf>,
    importers: RwLock<ImporterRegistry>,
    entries: Mutex<HashMap<PathBuf, Slot>>,
    counters: Counters,
    temp_seq: AtomicUsize,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(ImporterRegistry::with_defaults())
    }
}

impl ModelCache {
    /// Create a cache using `importers`. No disk cache until
    /// [`set_cache_dir`](Self::set_cache_dir) is called.
    pub fn new(importers: ImporterRegistry) -> Self {
        Self {
            cache_dir: OnceLock::new(),
            importers: RwLock::new(importers),
            entries: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            temp_seq: AtomicUsize::new(0),
        }
    }

    /// Choose the cache directory. Can only be done once.
    pub fn set_cache_dir(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create model cache directory");
        }
        self.cache_dir.set(dir).map_err(|_| {
            CacheError::CacheDirAlreadySet(self.cache_dir().map(Path::to_path_buf).unwrap_or_default())
        })
    }

    /// The cache directory, if set.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.get().map(PathBuf::as_path)
    }

    /// Add an importer after the built-in ones.
    pub fn register_importer(&self, importer: Box<dyn ModelImporter>) {
        self.importers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(importer);
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            imports: self.counters.imports.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|slot| matches!(slot.get(), Some(Some(_))))
            .count()
    }

    /// True if nothing is held in memory.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a model. Returns `None` when the file is missing, not
    /// recognized, or fails to import; the reason is logged.
    pub fn load(&self, path: impl AsRef<Path>) -> Option<Arc<CacheEntry>> {
        let key = normalize(path.as_ref());

        let slot = {
            let mut entries = self.lock_entries();
            if let Some(slot) = entries.get(&key) {
                match slot.get() {
                    Some(Some(entry)) if !source_changed(entry) => {
                        self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
                        return Some(Arc::clone(entry));
                    }
                    Some(Some(_)) => {
                        debug!(path = %key.display(), "source changed, reloading");
                        entries.remove(&key);
                    }
                    // failed load not yet evicted
                    Some(None) => {
                        entries.remove(&key);
                    }
                    // in flight on another thread
                    None => {}
                }
            }
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let result = slot
            .get_or_init(|| match self.load_uncached(&key) {
                Ok(entry) => Some(Arc::new(entry)),
                Err(e) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(path = %key.display(), error = %e, "model not loaded");
                    None
                }
            })
            .clone();

        if result.is_none() {
            // failures are not memoized, a later load may succeed
            let mut entries = self.lock_entries();
            if entries.get(&key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                entries.remove(&key);
            }
        }
        result
    }

    /// Flattened, renderable model for `path`.
    pub fn get_model(&self, path: impl AsRef<Path>) -> Option<Arc<RenderModel>> {
        self.load(path).map(|entry| entry.render_model())
    }

    /// Drop every in-memory entry. With `close_importers`, importers are
    /// also told to release their resources.
    pub fn flush_cache(&self, close_importers: bool) {
        let dropped = {
            let mut entries = self.lock_entries();
            let n = entries.len();
            entries.clear();
            n
        };
        if close_importers {
            self.importers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .close_all();
        }
        debug!(dropped, close_importers, "model cache flushed");
    }

    /// Delete cache blobs not modified for `max_age_days`. Returns the
    /// number of files removed. Zero days disables the sweep.
    pub fn clean_cache_dir(&self, max_age_days: u32) -> Result<usize> {
        let Some(dir) = self.cache_dir() else {
            return Ok(0);
        };
        if max_age_days == 0 || !dir.is_dir() {
            return Ok(0);
        }
        let max_age = Duration::from_secs(u64::from(max_age_days) * 24 * 60 * 60);
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !is_cache_file(&path) {
                continue;
            }
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat cache blob");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > max_age {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "cannot remove cache blob"),
                }
            }
        }
        info!(removed, max_age_days, "cleaned model cache directory");
        Ok(removed)
    }

    fn load_uncached(&self, path: &Path) -> Result<CacheEntry> {
        let modified = fs::metadata(path)?.modified().ok();
        let hash = ContentHash::of_file(path)?;

        let scene = match self.read_blob(&hash, modified) {
            Some(scene) => {
                self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
                scene
            }
            None => {
                let scene = self.import(path)?;
                self.counters.imports.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self.write_blob(&hash, &scene, modified) {
                    warn!(error = %e, "cannot write model cache blob, continuing without it");
                }
                scene
            }
        };

        Ok(CacheEntry {
            source: path.to_path_buf(),
            hash,
            modified,
            scene,
            render: OnceLock::new(),
        })
    }

    fn import(&self, path: &Path) -> std::result::Result<SceneGraph, ImportError> {
        let importers = self.importers.read().unwrap_or_else(PoisonError::into_inner);
        let importer = importers
            .find(path)
            .ok_or_else(|| ImportError::UnsupportedFormat(path.to_path_buf()))?;
        let scene = importer.import(path)?;
        scene.validate()?;
        info!(
            path = %path.display(),
            importer = importer.name(),
            triangles = scene.triangle_count(),
            "imported model"
        );
        Ok(scene)
    }

    fn blob_path(&self, hash: &ContentHash) -> Option<PathBuf> {
        self.cache_dir()
            .map(|dir| dir.join(format!("{}.{CACHE_EXTENSION}", hash.to_hex())))
    }

    fn read_blob(&self, hash: &ContentHash, source_modified: Option<SystemTime>) -> Option<SceneGraph> {
        let path = self.blob_path(hash)?;
        match self.try_read_blob(&path, hash, source_modified) {
            Ok(scene) => Some(scene),
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!(blob = %path.display(), error = %e, "ignoring cache blob");
                None
            }
        }
    }

    fn try_read_blob(
        &self,
        path: &Path,
        hash: &ContentHash,
        source_modified: Option<SystemTime>,
    ) -> Result<SceneGraph> {
        let blob_modified = fs::metadata(path)?.modified()?;
        if source_modified.is_some_and(|src| blob_modified < src) {
            return Err(CacheError::Stale("older than source".into()));
        }
        let blob: CacheBlob = serde_json::from_slice(&fs::read(path)?)?;
        if blob.format != BLOB_FORMAT || blob.hash != hash.to_hex() {
            return Err(CacheError::Stale("header mismatch".into()));
        }
        blob.scene.validate()?;
        Ok(blob.scene)
    }

    fn write_blob(
        &self,
        hash: &ContentHash,
        scene: &SceneGraph,
        source_modified: Option<SystemTime>,
    ) -> Result<()> {
        let Some(path) = self.blob_path(hash) else {
            return Ok(());
        };
        let blob = CacheBlob {
            format: BLOB_FORMAT,
            hash: hash.to_hex(),
            scene: scene.clone(),
        };
        // write then rename so readers never see a partial blob
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{CACHE_EXTENSION}.tmp{}-{seq}", std::process::id()));
        fs::write(&tmp, serde_json::to_vec(&blob)?)?;
        if let Some(src) = source_modified {
            if src > SystemTime::now() {
                fs::File::options().write(true).open(&tmp)?.set_modified(src)?;
            }
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(blob = %path.display(), "wrote cache blob");
        Ok(())
    }
}

/// Blobs and the temp files a crashed write leaves behind.
fn is_cache_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXTENSION)
        || name.contains(&format!(".{CACHE_EXTENSION}.tmp"))
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn source_changed(entry: &CacheEntry) -> bool {
    let current = fs::metadata(&entry.source).and_then(|m| m.modified()).ok();
    match (current, entry.modified) {
        (Some(now), Some(then)) => now > then,
        _ => false,
    }
}
