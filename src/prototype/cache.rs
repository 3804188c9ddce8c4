//! Two-tier prototype memoization: in-process map plus optional JSON files.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::ServicePrototype;
use crate::class::ClassMetadata;
use crate::error::DiResult;

/// Bumped whenever the persisted layout changes; older files become misses.
const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedPrototype {
    format: u32,
    crate_version: String,
    generated_at: DateTime<Utc>,
    /// Hash of the class declaration the plan was analyzed from.
    #[serde(default)]
    fingerprint: Option<u64>,
    prototype: ServicePrototype,
}

/// Counters describing how prototypes were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrototypeCacheStats {
    /// Served from memory.
    pub hits: u64,
    /// Loaded from the persisted tier.
    pub disk_hits: u64,
    /// Computed by the analyzer.
    pub misses: u64,
    /// Persisted reads or writes that failed and were ignored.
    pub disk_errors: u64,
}

/// Memoizes prototypes so introspection runs once per class per process.
///
/// A failure anywhere in the persisted tier is logged and treated as a
/// miss; it never fails a resolution.
#[derive(Debug)]
pub struct PrototypeCache {
    memory: RwLock<HashMap<String, Arc<ServicePrototype>>>,
    directory: Option<PathBuf>,
    hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    disk_errors: AtomicU64,
}

impl PrototypeCache {
    pub fn in_memory() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            directory: None,
            hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disk_errors: AtomicU64::new(0),
        }
    }

    /// Cache that also reads and writes prototypes under `directory`.
    /// The directory is created lazily on first write.
    pub fn persisted(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Self::in_memory()
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Returns the cached prototype for `class`, computing it on first use.
    ///
    /// A persisted plan is only reused when it was written for the same
    /// `fingerprint` (see [`metadata_fingerprint`]). Errors from `compute`
    /// propagate and nothing is cached for them.
    pub fn get_or_compute<F>(
        &self,
        class: &str,
        fingerprint: Option<u64>,
        compute: F,
    ) -> DiResult<Arc<ServicePrototype>>
    where
        F: FnOnce() -> DiResult<ServicePrototype>,
    {
        if let Some(found) = self.memory.read().get(class) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found.clone());
        }

        if let Some(loaded) = self.load(class, fingerprint) {
            self.disk_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(class, "prototype loaded from disk");
            return Ok(self.insert(class, loaded));
        }

        let computed = compute()?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.store(class, fingerprint, &computed);
        Ok(self.insert(class, computed))
    }

    /// In-memory lookup only.
    pub fn get(&self, class: &str) -> Option<Arc<ServicePrototype>> {
        self.memory.read().get(class).cloned()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.memory.read().contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.memory.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.read().is_empty()
    }

    pub fn stats(&self) -> PrototypeCacheStats {
        PrototypeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            disk_errors: self.disk_errors.load(Ordering::Relaxed),
        }
    }

    /// Drops every in-memory prototype and deletes persisted ones.
    pub fn clear(&self) {
        let classes: Vec<String> = self.memory.write().drain().map(|(class, _)| class).collect();
        let Some(directory) = &self.directory else {
            return;
        };
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => {
                self.disk_error("clear", directory, &err);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Err(err) = fs::remove_file(&path) {
                    self.disk_error("clear", &path, &err);
                }
            }
        }
        tracing::debug!(cleared = classes.len(), "prototype cache cleared");
    }

    fn insert(&self, class: &str, prototype: ServicePrototype) -> Arc<ServicePrototype> {
        // First writer wins so concurrent callers share one plan.
        self.memory
            .write()
            .entry(class.to_string())
            .or_insert_with(|| Arc::new(prototype))
            .clone()
    }

    fn load(&self, class: &str, fingerprint: Option<u64>) -> Option<ServicePrototype> {
        let path = self.path_for(class)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                self.disk_error("read", &path, &err);
                return None;
            }
        };
        let persisted: PersistedPrototype = match serde_json::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(err) => {
                self.disk_error("decode", &path, &err);
                return None;
            }
        };
        if persisted.format != FORMAT_VERSION
            || persisted.crate_version != env!("CARGO_PKG_VERSION")
            || persisted.prototype.class != class
            || persisted.fingerprint != fingerprint
        {
            tracing::debug!(class, path = %path.display(), "stale persisted prototype ignored");
            return None;
        }
        Some(persisted.prototype)
    }

    fn store(&self, class: &str, fingerprint: Option<u64>, prototype: &ServicePrototype) {
        let Some(path) = self.path_for(class) else {
            return;
        };
        if let Err(err) = write_atomically(&path, fingerprint, prototype) {
            self.disk_error("write", &path, &err);
        }
    }

    fn path_for(&self, class: &str) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(file_name_for(class)))
    }

    fn disk_error(&self, op: &str, path: &Path, err: &dyn std::fmt::Display) {
        self.disk_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(op, path = %path.display(), error = %err, "persisted prototype cache failure ignored");
    }
}

impl Default for PrototypeCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Stable hash of a class declaration, used to invalidate persisted plans
/// when the declaration changes between runs.
pub fn metadata_fingerprint(metadata: &ClassMetadata) -> Option<u64> {
    serde_json::to_vec(metadata).ok().map(|bytes| fnv1a(&bytes))
}

fn write_atomically(path: &Path, fingerprint: Option<u64>, prototype: &ServicePrototype) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let persisted = PersistedPrototype {
        format: FORMAT_VERSION,
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        fingerprint,
        prototype: prototype.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&persisted).map_err(io::Error::other)?;
    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Readable, collision-resistant file name for a class.
fn file_name_for(class: &str) -> String {
    let readable: String = class
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(64)
        .collect();
    format!("{}-{:016x}.json", readable, fnv1a(class.as_bytes()))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
