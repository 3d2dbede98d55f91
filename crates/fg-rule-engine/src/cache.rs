// SPDX-License-Identifier: MIT OR Apache-2.0
//! Leaf outcome caches.
//!
//! [`RequestCache`] lives for one request and is shared by that request's
//! concurrent field checks. [`StrictCache`] lives for the process and is
//! shared by every request; entries are never invalidated.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// Stable digest of an evaluation input, used as the strict cache key.
pub trait Fingerprint {
    /// Digest of everything a predicate may read, or `None` when the input
    /// cannot be fingerprinted (the leaf is then evaluated uncached).
    fn fingerprint(&self) -> Option<String>;
}

impl Fingerprint for () {
    fn fingerprint(&self) -> Option<String> {
        Some(String::new())
    }
}

/// The cached result of evaluating one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafOutcome {
    /// Boolean value of the leaf.
    pub value: bool,
    /// Whether the value is `false` because no caller identity was present.
    pub identity_required: bool,
}

/// Composite cache key: a scope (site or input digest) and a predicate name.
pub type CacheKey = (String, String);

/// Per-request leaf cache keyed by (`Type.field`, predicate name).
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<CacheKey, LeafOutcome>>,
}

impl RequestCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the outcome of `predicate` at `site`.
    pub fn get(&self, site: &str, predicate: &str) -> Option<LeafOutcome> {
        let entries = self.entries.lock().expect("request cache lock poisoned");
        entries
            .get(&(site.to_string(), predicate.to_string()))
            .copied()
    }

    /// Store the outcome of `predicate` at `site`.
    pub fn insert(&self, site: &str, predicate: &str, outcome: LeafOutcome) {
        let mut entries = self.entries.lock().expect("request cache lock poisoned");
        entries.insert((site.to_string(), predicate.to_string()), outcome);
    }

    /// Number of cached outcomes.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("request cache lock poisoned")
            .len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide leaf cache keyed by (input fingerprint, predicate name).
#[derive(Debug, Default)]
pub struct StrictCache {
    entries: RwLock<HashMap<CacheKey, LeafOutcome>>,
}

impl StrictCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the outcome of `predicate` for the input digest `fingerprint`.
    pub fn get(&self, fingerprint: &str, predicate: &str) -> Option<LeafOutcome> {
        let entries = self.entries.read().expect("strict cache lock poisoned");
        entries
            .get(&(fingerprint.to_string(), predicate.to_string()))
            .copied()
    }

    /// Store an outcome. A concurrent writer for the same key may win; both
    /// computed the same input so either value is acceptable.
    pub fn insert(&self, fingerprint: &str, predicate: &str, outcome: LeafOutcome) {
        let mut entries = self.entries.write().expect("strict cache lock poisoned");
        entries.insert((fingerprint.to_string(), predicate.to_string()), outcome);
    }

    /// Number of cached outcomes.
    pub fn len(&self) -> usize {
        self.entries.read().expect("strict cache lock poisoned").len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Only used by tooling; requests never invalidate.
    pub fn clear(&self) {
        self.entries
            .write()
            .expect("strict cache lock poisoned")
            .clear();
    }
}
