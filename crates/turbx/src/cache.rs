// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pre-compiled template caching.
//!
//! Pre-compiling a template is far more expensive than rendering it, so the
//! intermediate form of every file is kept in a [`Cache`] under two keys: the
//! resolved path (`pages/index`) for the base record and `pages/index.pre`
//! for the record folded against constant data.
//!
//! # Cache Implementations
//!
//! - [`MemoryCache`]: In-memory LRU cache with per-entry TTL
//! - [`NoOpCache`]: Never stores anything (development)
//!
//! # Custom Caches
//!
//! Implement the [`Cache`] trait for other strategies (shared memory, etc.).

use crate::error::{Result, TurbxError};
use crate::lexer::StringEntry;
use crate::script::ScriptBlock;
use crate::tags::AttrSet;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default time-to-live of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Default number of records kept in memory.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Suffix of the constant-folded twin key.
pub const PRE_SUFFIX: &str = ".pre";

/// The intermediate form of one template file.
///
/// The attribute, string and script tables are immutable once the record is
/// built; folding creates a new record.
#[derive(Debug, Clone, Default)]
pub struct TemplateFile {
    /// Resolved path without extension.
    pub path: String,
    /// Intermediate source in encoded form.
    pub html: String,
    /// Attribute table referenced by placeholders.
    pub attrs: Vec<AttrSet>,
    /// String table referenced by `%!<n>!%`.
    pub strings: Vec<StringEntry>,
    /// Script table referenced by `<!_script n/>`.
    pub scripts: Vec<ScriptBlock>,
    /// SHA-256 of the source the record was built from.
    pub fingerprint: String,
}

impl TemplateFile {
    /// Creates a record; the fingerprint is computed from `html`.
    pub fn new(
        path: impl Into<String>,
        html: impl Into<String>,
        attrs: Vec<AttrSet>,
        strings: Vec<StringEntry>,
        scripts: Vec<ScriptBlock>,
    ) -> Self {
        let html = html.into();
        Self {
            path: path.into(),
            fingerprint: fingerprint(&html),
            html,
            attrs,
            strings,
            scripts,
        }
    }

    /// Looks up an attribute set by index.
    pub fn attr(&self, index: usize) -> Option<&AttrSet> {
        self.attrs.get(index)
    }
}

/// SHA-256 hex digest of `source`.
pub fn fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Returns the constant-folded twin of a cache key.
pub fn pre_key(key: &str) -> String {
    format!("{}{}", key, PRE_SUFFIX)
}

/// Trait for template record caches.
///
/// Implementations are shared by concurrent renders and must be thread-safe.
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// Retrieves a record from the cache.
    fn get(&self, key: &str) -> Result<Option<Arc<TemplateFile>>>;
    /// Stores a record. A live entry with the same fingerprint is kept.
    fn set(&self, key: &str, file: Arc<TemplateFile>) -> Result<()>;
    /// Removes a record.
    fn remove(&self, key: &str) -> Result<()>;
    /// Clears all records.
    fn clear(&self) -> Result<()>;
    /// Checks if a live record exists.
    fn contains_key(&self, key: &str) -> bool;
    /// Changes the time-to-live of entries stored from now on.
    fn set_ttl(&self, _ttl: Duration) {}
    /// Creates a boxed clone sharing the same storage.
    fn clone_box(&self) -> Box<dyn Cache>;
}

impl Clone for Box<dyn Cache> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug)]
struct Entry {
    file: Arc<TemplateFile>,
    expires: Instant,
}

#[derive(Debug)]
struct Store {
    lru: LruCache<String, Entry>,
    ttl: Duration,
}

/// In-memory LRU cache with per-entry expiry.
///
/// # Examples
///
/// ```rust,ignore
/// use turbx::MemoryCache;
///
/// // Room for 100 records, each kept for two hours
/// let cache = MemoryCache::new(100);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<Mutex<Store>>,
}

impl MemoryCache {
    /// Creates a cache with the given capacity and the default TTL.
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, DEFAULT_TTL)
    }

    /// Creates a cache with the given capacity and TTL.
    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(Mutex::new(Store {
                lru: LruCache::new(capacity),
                ttl,
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| TurbxError::Cache("Failed to acquire cache lock".to_string()))
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Arc<TemplateFile>>> {
        let mut store = self.lock()?;
        let expired = match store.lru.get(key) {
            Some(entry) if entry.expires > Instant::now() => return Ok(Some(entry.file.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            tracing::debug!("Cache entry expired: {}", key);
            store.lru.pop(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, file: Arc<TemplateFile>) -> Result<()> {
        let mut store = self.lock()?;
        let now = Instant::now();
        if let Some(entry) = store.lru.peek(key) {
            if entry.expires > now && entry.file.fingerprint == file.fingerprint {
                return Ok(());
            }
        }
        let expires = now + store.ttl;
        store.lru.put(key.to_string(), Entry { file, expires });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.lru.pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.lru.clear();
        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        match self.store.lock() {
            Ok(store) => store
                .lru
                .peek(key)
                .is_some_and(|entry| entry.expires > Instant::now()),
            Err(_) => false,
        }
    }

    fn set_ttl(&self, ttl: Duration) {
        if let Ok(mut store) = self.store.lock() {
            store.ttl = ttl;
        }
    }

    fn clone_box(&self) -> Box<dyn Cache> {
        Box::new(Self {
            store: Arc::clone(&self.store),
        })
    }
}

/// No-op cache that never stores or retrieves anything.
///
/// Useful during development where every render should pre-compile fresh.
#[derive(Debug, Clone, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Creates a new no-op cache.
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoOpCache {
    fn get(&self, _key: &str) -> Result<Option<Arc<TemplateFile>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _file: Arc<TemplateFile>) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn contains_key(&self, _key: &str) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn Cache> {
        Box::new(NoOpCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(html: &str) -> Arc<TemplateFile> {
        Arc::new(TemplateFile::new("index", html, vec![], vec![], vec![]))
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new(10);

        cache.set("index", record("<p>a</p>")).unwrap();
        let retrieved = cache.get("index").unwrap().unwrap();
        assert_eq!(retrieved.path, "index");
        assert_eq!(retrieved.html, "<p>a</p>");

        assert!(cache.contains_key("index"));
        assert!(!cache.contains_key("nonexistent"));

        cache.remove("index").unwrap();
        assert!(!cache.contains_key("index"));
        assert!(cache.get("index").unwrap().is_none());
    }

    #[test]
    fn test_write_once_per_fingerprint() {
        let cache = MemoryCache::new(10);
        let first = record("same");
        cache.set("index", first.clone()).unwrap();
        cache.set("index", record("same")).unwrap();
        assert!(Arc::ptr_eq(&cache.get("index").unwrap().unwrap(), &first));

        cache.set("index", record("changed")).unwrap();
        assert_eq!(cache.get("index").unwrap().unwrap().html, "changed");
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MemoryCache::with_ttl(10, Duration::ZERO);
        cache.set("index", record("x")).unwrap();
        assert!(!cache.contains_key("index"));
        assert!(cache.get("index").unwrap().is_none());

        cache.set_ttl(Duration::from_secs(60));
        cache.set("index", record("x")).unwrap();
        assert!(cache.contains_key("index"));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.set("a", record("a")).unwrap();
        cache.set("b", record("b")).unwrap();
        cache.get("a").unwrap();
        cache.set("c", record("c")).unwrap();
        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("c"));
    }

    #[test]
    fn test_shared_clone_and_noop() {
        let cache = MemoryCache::new(4);
        let boxed: Box<dyn Cache> = Box::new(cache.clone());
        boxed.set("x", record("x")).unwrap();
        assert!(cache.contains_key("x"));
        boxed.clear().unwrap();
        assert!(!cache.contains_key("x"));

        let noop = NoOpCache::new();
        noop.set("x", record("x")).unwrap();
        assert!(noop.get("x").unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_and_keys() {
        assert_eq!(fingerprint("abc").len(), 64);
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(pre_key("pages/index"), "pages/index.pre");
    }
}
