//! Tunable constants for the storage and contest layers.
//!
//! spec.md names several constants inline ("preevaluate budget", "GOAL =
//! 5", "`max_turn` starts small (10 units) and grows ×10 up to 10000").
//! Those are not wired up to an external config file format — spec.md
//! says config loading is unspecified — so this is a plain struct with a
//! `Default` impl, the way the teacher's pre-TOML configuration was
//! shaped before it grew a file format of its own.

/// Tunables for the tile cache, partitioned store, and AND contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Tile size in bytes (spec.md §3 "Tile"). Must be a power of two.
    pub tile_size: u32,
    /// Maximum number of tiles with `rc == 0` the cache keeps around
    /// before evicting under LRU (spec.md §2 "Tile cache").
    pub cache_capacity: usize,
    /// Fixed budget for AND's small-set pre-evaluation step (spec.md
    /// §4.5.1 step 6).
    pub preevaluate_budget: i64,
    /// Number of passing ids a contest competitor must produce before
    /// its turn ends (spec.md §4.5.2 "Round-robin"), called `GOAL` there.
    pub contest_goal: usize,
    /// Starting per-turn budget slice in the contest ladder (spec.md
    /// §4.5.2).
    pub contest_turn_floor: i64,
    /// Ceiling the per-turn budget ladder ratchets up to.
    pub contest_turn_ceiling: i64,
    /// Growth factor applied to the per-turn ladder each round it is
    /// raised.
    pub contest_turn_growth: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            tile_size: 32 * 1024,
            cache_capacity: 4096,
            preevaluate_budget: 10_000,
            contest_goal: 5,
            contest_turn_floor: 10,
            contest_turn_ceiling: 10_000,
            contest_turn_growth: 10,
        }
    }
}

impl StoreConfig {
    /// Builder-style override of the tile size.
    pub fn with_tile_size(mut self, bytes: u32) -> Self {
        self.tile_size = bytes;
        self
    }

    /// Builder-style override of the cache capacity.
    pub fn with_cache_capacity(mut self, tiles: usize) -> Self {
        self.cache_capacity = tiles;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let c = StoreConfig::default();
        assert_eq!(c.tile_size, 32 * 1024);
        assert_eq!(c.preevaluate_budget, 10_000);
        assert_eq!(c.contest_goal, 5);
        assert_eq!(c.contest_turn_floor, 10);
        assert_eq!(c.contest_turn_ceiling, 10_000);
    }
}
