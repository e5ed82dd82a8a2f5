//! Used-id tracking for schema conversion.
//!
//! During schema conversion, relation/attribute and key ids are remapped
//! into a packed range instead of issued monotonically: the caller scans
//! the catalog into a [`UsedIdMap`] and the store allocates the lowest id
//! not yet taken, below the system-id threshold.

/// Upper bound (exclusive) for remapped object ids; ids at or above this
/// threshold belong to user-created objects and are never remapped into.
pub const MAX_SYSTEM_ID: u32 = 10_000;

const WORD_BITS: u32 = 64;

/// Word-packed bitmap of object ids already in use.
///
/// Id 0 is never allocated; the bitmap still addresses it so callers can
/// insert catalog contents verbatim.
#[derive(Debug, Clone, Default)]
pub struct UsedIdMap {
    words: Vec<u64>,
}

impl UsedIdMap {
    /// Empty map.
    pub fn new() -> UsedIdMap {
        UsedIdMap { words: Vec::new() }
    }

    /// Mark an id as used.
    pub fn insert(&mut self, id: u32) {
        let word = (id / WORD_BITS) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (id % WORD_BITS);
    }

    /// Whether an id is marked used.
    pub fn contains(&self, id: u32) -> bool {
        self.words
            .get((id / WORD_BITS) as usize)
            .is_some_and(|w| w & (1u64 << (id % WORD_BITS)) != 0)
    }

    /// Lowest id in `[1, limit)` not marked used, or `None` when the range
    /// is exhausted.
    pub fn first_clear_below(&self, limit: u32) -> Option<u32> {
        (1..limit).find(|&id| !self.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_allocates_one() {
        let used = UsedIdMap::new();
        assert_eq!(used.first_clear_below(MAX_SYSTEM_ID), Some(1));
        assert!(!used.contains(1));
    }

    #[test]
    fn test_insert_and_contains() {
        let mut used = UsedIdMap::new();
        used.insert(1);
        used.insert(63);
        used.insert(64);
        used.insert(9_999);
        assert!(used.contains(1));
        assert!(used.contains(63));
        assert!(used.contains(64));
        assert!(used.contains(9_999));
        assert!(!used.contains(2));
        assert!(!used.contains(10_000));
    }

    #[test]
    fn test_first_clear_skips_used_prefix() {
        let mut used = UsedIdMap::new();
        for id in 1..100 {
            used.insert(id);
        }
        assert_eq!(used.first_clear_below(MAX_SYSTEM_ID), Some(100));
    }

    #[test]
    fn test_exhausted_range() {
        let mut used = UsedIdMap::new();
        for id in 1..10 {
            used.insert(id);
        }
        assert_eq!(used.first_clear_below(10), None);
    }
}
