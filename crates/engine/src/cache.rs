//! Per-original result cache (spec.md §4.4 "Iterator cache").
//!
//! Every AND original keeps one of these: an append-only, direction-
//! ordered list of produced ids, each tagged with the budget it cost to
//! produce. Clones of the original consult the cache before driving
//! anything themselves (spec.md §4.5.5).

use gravel_core::id::Id;

/// One cache entry: the id produced and what it cost to get there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// The produced id.
    pub id: Id,
    /// Budget units spent producing this entry (inclusive of everything
    /// since the previous entry).
    pub cost: i64,
}

/// The per-original cache described in spec.md §4.4.
#[derive(Debug, Clone, Default)]
pub struct IteratorCache {
    entries: Vec<CacheEntry>,
    eof: bool,
}

impl IteratorCache {
    /// An empty cache, not yet known to be exhausted.
    pub fn new() -> Self {
        IteratorCache {
            entries: Vec::new(),
            eof: false,
        }
    }

    /// Append a newly produced id. Must be monotone with whatever is
    /// already cached, in the producer's direction; debug builds assert
    /// this.
    pub fn add(&mut self, id: Id, cost: i64) {
        if let Some(last) = self.entries.last() {
            debug_assert_ne!(last.id, id, "cache entries must be distinct ids");
        }
        self.entries.push(CacheEntry { id, cost });
    }

    /// Mark the cache as having reached the end of the underlying set.
    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// `true` once the cache holds every id the producer will ever
    /// produce.
    pub fn cache_eof(&self) -> bool {
        self.eof
    }

    /// Number of cached entries.
    pub fn n(&self) -> usize {
        self.entries.len()
    }

    /// The id at cache position `i`, if any.
    pub fn index(&self, i: usize) -> Option<Id> {
        self.entries.get(i).map(|e| e.id)
    }

    /// The entry at cache position `i`, if any.
    pub fn entry(&self, i: usize) -> Option<CacheEntry> {
        self.entries.get(i).copied()
    }

    /// Binary search the cache for `id`'s position, assuming ascending
    /// order. Returns `Ok(i)` for an exact hit, `Err(i)` for the index
    /// `id` would occupy.
    pub fn search(&self, id: Id) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.id.cmp(&id))
    }

    /// Clear every cached entry (used when `evolve` invalidates a
    /// producer's prior output).
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.eof = false;
    }

    /// Last cached id, if any.
    pub fn last(&self) -> Option<Id> {
        self.entries.last().map(|e| e.id)
    }
}
