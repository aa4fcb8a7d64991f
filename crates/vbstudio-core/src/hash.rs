//! Deterministic content hashing for compilation units.
//!
//! [`ContentHash`] is the identity used by the cache: two sources with the
//! same bytes always hash to the same value, across runs and machines.
//!
//! # Examples
//!
//! ```
//! use vbstudio_core::ContentHash;
//!
//! let a = ContentHash::of("Dim x As Integer");
//! let b = ContentHash::of("Dim x As Integer");
//! assert_eq!(a, b);
//! assert_ne!(a, ContentHash::of("Dim y As Integer"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Seed used for all source hashes. Changing it invalidates every cache entry.
const SOURCE_SEED: u64 = 0x5642_5f53_5243_0001;

/// A 64-bit XXHash of a source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub u64);

impl ContentHash {
    /// Hash a source text.
    #[inline]
    pub fn of(source: &str) -> Self {
        ContentHash(xxh64(source.as_bytes(), SOURCE_SEED))
    }

    /// The raw hash value.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
