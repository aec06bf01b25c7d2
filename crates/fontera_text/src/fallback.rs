//! Per-codepoint font fallback cache
//!
//! Finding a face for a codepoint the primary fonts lack means scanning every
//! installed font. The answer (including "no font has it") is remembered for
//! the lifetime of the owning registry, so each codepoint is searched at most
//! once. The cache is unbounded; the number of distinct codepoints a process
//! renders is small in practice.

use crate::font::FontFace;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Cache of fallback lookups keyed by codepoint
#[derive(Default)]
pub struct FallbackCache {
    entries: FxHashMap<char, Option<Arc<FontFace>>>,
    hits: u64,
    misses: u64,
}

impl FallbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `c`, running `resolve` on first lookup
    pub fn resolve(
        &mut self,
        c: char,
        resolve: impl FnOnce() -> Option<Arc<FontFace>>,
    ) -> Option<Arc<FontFace>> {
        if let Some(cached) = self.entries.get(&c) {
            self.hits += 1;
            return cached.clone();
        }

        self.misses += 1;
        let found = resolve();
        if found.is_none() {
            tracing::debug!("No installed font covers U+{:04X}", c as u32);
        }
        self.entries.insert(c, found.clone());
        found
    }

    /// Cached result without resolving; `None` if never looked up
    pub fn get(&self, c: char) -> Option<Option<Arc<FontFace>>> {
        self.entries.get(&c).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation
    pub fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_once_per_codepoint() {
        let mut cache = FallbackCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let found = cache.resolve('字', || {
                calls += 1;
                None
            });
            assert!(found.is_none());
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.counters(), (2, 1));
    }

    #[test]
    fn test_negative_results_are_cached() {
        let mut cache = FallbackCache::new();
        assert!(cache.get('x').is_none());

        cache.resolve('x', || None);
        assert_eq!(cache.get('x'), Some(None));
    }
}
