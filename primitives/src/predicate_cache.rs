//! Memoizes the `[x < p/2]` predicate shares produced during `LessThan`, so that repeated
//! comparisons against the same operand don't recompute the same predicate bit from scratch
//! (SPEC_FULL.md §4.C, the Nishide-Ohta comparison family).
//!
//! Keyed by whatever the caller considers a stable identity for an operand (typically the
//! operand's own operation id); this module has no opinion on what makes a good key.

use math_lib::field::FieldElement;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

/// A thread-safe cache of predicate shares, keyed by caller-chosen operand id.
#[derive(Default)]
pub struct PredicateCache {
    entries: Mutex<FxHashMap<u64, FieldElement>>,
}

impl PredicateCache {
    /// Builds an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached predicate share for `key`, if present.
    #[allow(clippy::unwrap_used)]
    pub fn get(&self, key: u64) -> Option<FieldElement> {
        self.entries.lock().unwrap().get(&key).copied()
    }

    /// Inserts (or overwrites) the predicate share for `key`.
    #[allow(clippy::unwrap_used)]
    pub fn insert(&self, key: u64, value: FieldElement) {
        self.entries.lock().unwrap().insert(key, value);
    }

    /// Returns the number of cached entries; mainly for test assertions.
    #[allow(clippy::unwrap_used)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True iff no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use math_lib::field::Field;

    #[test]
    fn reuses_inserted_entry() {
        let field = Field::new(41).unwrap();
        let cache = PredicateCache::new();
        assert!(cache.get(7).is_none());
        cache.insert(7, field.element(1));
        assert_eq!(cache.get(7), Some(field.element(1)));
        assert_eq!(cache.len(), 1);
    }
}
