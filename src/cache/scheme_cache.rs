use crate::scheme::QuantifiedScheme;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Binary cache of schemes extracted from derivation files
#[derive(Serialize, Deserialize, Debug)]
pub struct SchemeCache {
    /// scheme-env version that wrote the cache
    pub version: String,
    pub entries: Vec<CacheEntry>,
    /// `source_hash` of a fixed text at write time. `DefaultHasher` output is
    /// not stable across Rust releases.
    pub hasher_check: u64,
    /// Cache creation timestamp
    pub timestamp: SystemTime,
}

/// Schemes of one successfully checked file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub source_hash: u64,
    pub schemes: Vec<QuantifiedScheme>,
}

const HASHER_CHECK_TEXT: &str = "forall<ty T> exists<lt I> { I <= 'static } => (&I T)";

/// Hash of a derivation's source text
pub fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

impl SchemeCache {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entries: Vec::new(),
            hasher_check: source_hash(HASHER_CHECK_TEXT),
            timestamp: SystemTime::now(),
        }
    }

    /// Empty cache for the running version
    pub fn current() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }

    /// Get cache file path
    pub fn cache_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .context("Failed to get cache directory")?
            .join("scheme-env");

        fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

        Ok(cache_dir.join("schemes.bin"))
    }

    /// Load cache from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::cache_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read cache from {}", path.display()))?;

        bincode::deserialize(&bytes).context("Failed to deserialize cache")
    }

    /// Load the cache if it exists and was written by this version
    pub fn load_current() -> Self {
        match Self::load() {
            Ok(cache) if cache.is_valid(env!("CARGO_PKG_VERSION")) => cache,
            Ok(cache) => {
                tracing::info!(
                    version = %cache.version,
                    "discarding cache from another version or toolchain"
                );
                Self::current()
            }
            Err(err) => {
                tracing::debug!(error = %err, "starting with an empty cache");
                Self::current()
            }
        }
    }

    /// Save cache to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::cache_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self).context("Failed to serialize cache")?;

        fs::write(path, bytes)
            .with_context(|| format!("Failed to write cache to {}", path.display()))?;

        Ok(())
    }

    /// Check if cache is valid: same crate version, and source hashes
    /// computed now agree with the ones it was written with
    pub fn is_valid(&self, current_version: &str) -> bool {
        self.version == current_version && self.hasher_check == source_hash(HASHER_CHECK_TEXT)
    }

    /// Schemes recorded for `path`, if its source has not changed since
    pub fn lookup(&self, path: &Path, source: &str) -> Option<&[QuantifiedScheme]> {
        let hash = source_hash(source);
        self.entries
            .iter()
            .find(|entry| entry.path == path && entry.source_hash == hash)
            .map(|entry| entry.schemes.as_slice())
    }

    /// Record the schemes of `path`, replacing any older entry
    pub fn insert(&mut self, path: PathBuf, source: &str, schemes: Vec<QuantifiedScheme>) {
        let entry = CacheEntry {
            source_hash: source_hash(source),
            path,
            schemes,
        };
        match self.entries.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.timestamp = SystemTime::now();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Term, Variable};

    fn scheme() -> QuantifiedScheme {
        let i = Variable::lt("I");
        QuantifiedScheme::exists(vec![i.clone()])
            .with_terms(vec![Term::reference(i.to_term(), Term::i32())])
    }

    #[test]
    fn test_cache_serialization() {
        let mut cache = SchemeCache::new("0.1.0");
        cache.insert(PathBuf::from("a.deriv"), "extract (i32)", vec![scheme()]);

        let bytes = bincode::serialize(&cache).unwrap();
        let deserialized: SchemeCache = bincode::deserialize(&bytes).unwrap();

        assert_eq!(deserialized.version, "0.1.0");
        assert_eq!(deserialized.entries, cache.entries);
    }

    #[test]
    fn test_cache_validation() {
        let cache = SchemeCache::new("0.1.0");

        assert!(cache.is_valid("0.1.0"));
        assert!(!cache.is_valid("0.2.0"));
    }

    #[test]
    fn test_cache_from_other_hasher_is_invalid() {
        let mut cache = SchemeCache::current();
        cache.insert(PathBuf::from("a.deriv"), "extract (i32)", vec![scheme()]);

        // Written by a build whose hasher gave different values
        cache.hasher_check = cache.hasher_check.wrapping_add(1);
        assert!(!cache.is_valid(env!("CARGO_PKG_VERSION")));

        let bytes = bincode::serialize(&cache).unwrap();
        let loaded: SchemeCache = bincode::deserialize(&bytes).unwrap();
        assert!(!loaded.is_valid(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_lookup_requires_unchanged_source() {
        let mut cache = SchemeCache::current();
        let path = PathBuf::from("a.deriv");
        cache.insert(path.clone(), "extract (i32)", vec![scheme()]);

        assert_eq!(cache.lookup(&path, "extract (i32)"), Some(&[scheme()][..]));
        assert_eq!(cache.lookup(&path, "extract (u8)"), None);
        assert_eq!(cache.lookup(Path::new("b.deriv"), "extract (i32)"), None);

        // Re-inserting replaces the entry
        cache.insert(path.clone(), "extract (u8)", vec![]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&path, "extract (u8)"), Some(&[][..]));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemes.bin");

        let mut cache = SchemeCache::current();
        cache.insert(PathBuf::from("a.deriv"), "x", vec![scheme()]);
        cache.save_to(&path).unwrap();

        let loaded = SchemeCache::load_from(&path).unwrap();
        assert!(loaded.is_valid(env!("CARGO_PKG_VERSION")));
        assert_eq!(loaded.entries, cache.entries);

        let err = SchemeCache::load_from(&dir.path().join("missing.bin")).unwrap_err();
        assert!(err.to_string().contains("Failed to read cache"));
    }
}
