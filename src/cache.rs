//! The compilation cache.
//!
//! Entries are keyed by unit id, or by [`jit_key`] for one-off snippets, and
//! hold the last successful result together with the hash of the source it
//! came from.

use crate::unit::CompilationUnit;
use rustc_hash::FxHashMap;
use std::time::SystemTime;
use vbstudio_compiler::CompilationResult;
use vbstudio_core::ContentHash;

/// Cache key for a JIT snippet with the given content hash.
pub fn jit_key(hash: ContentHash) -> String {
    format!("jit:{}", hash)
}

/// A cached successful compilation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub hash: ContentHash,
    pub result: CompilationResult,
    pub stored_at: SystemTime,
}

#[derive(Debug, Default)]
pub struct CompilationCache {
    entries: FxHashMap<String, CacheEntry>,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The cached result for `key` if it was computed from `hash`.
    pub fn lookup(&self, key: &str, hash: ContentHash) -> Option<&CompilationResult> {
        self.entries
            .get(key)
            .filter(|entry| entry.hash == hash)
            .map(|entry| &entry.result)
    }

    /// Store a result. Failed results are not cached; returns whether the
    /// entry was written.
    pub fn store(
        &mut self,
        key: impl Into<String>,
        hash: ContentHash,
        result: CompilationResult,
    ) -> bool {
        if !result.success {
            return false;
        }
        self.entries.insert(
            key.into(),
            CacheEntry {
                hash,
                result,
                stored_at: SystemTime::now(),
            },
        );
        true
    }

    /// Whether the cached result for `unit` can be reused.
    ///
    /// True when an entry exists for the unit, was computed from the same
    /// source hash, and every dependency of the unit has an entry of its
    /// own. Dependencies are checked for presence only: a dependency whose
    /// entry is stale does not invalidate its dependents.
    pub fn is_valid(&self, unit: &CompilationUnit) -> bool {
        self.lookup(unit.id(), unit.hash()).is_some()
            && unit.dependencies().iter().all(|dep| self.entries.contains_key(dep))
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
