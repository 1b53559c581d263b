//! Cache construction options
//!
//! Total capacity and shard count are set independently and resolved into a
//! [`Layout`] once, when the cache is built. Per-shard capacity is the floor
//! of `capacity / shard_count`; the remainder is not redistributed.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options accepted by [`LruCache::new`](crate::LruCache::new)
///
/// Both fields default to 0: unbounded capacity, one shard.
///
/// ```
/// use shardlru::Options;
///
/// let opts = Options::new().with_capacity(1024).with_shards(16);
/// let layout = opts.resolve().unwrap();
/// assert_eq!(layout.shard_count, 16);
/// assert_eq!(layout.shard_capacity, 64);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of entries across all shards (0 = unbounded)
    pub capacity: usize,

    /// Requested shard count; values below 1 mean 1, others are rounded up
    /// to the next power of two
    pub shards: usize,
}

/// Shard topology derived from [`Options`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Number of shards, always a power of two
    pub shard_count: usize,

    /// Capacity of every shard (0 = unbounded)
    pub shard_capacity: usize,

    /// Capacity dropped by the integer division
    pub lost_capacity: usize,
}

impl Options {
    /// Create options for an unbounded, single-shard cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the shard count
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Resolve into a concrete shard layout
    ///
    /// # Returns
    /// * `Result<Layout>` - `Error::Config` if the shard count cannot be
    ///   rounded to a power of two, or a bounded capacity would leave shards
    ///   with no room at all
    pub fn resolve(&self) -> Result<Layout> {
        let shard_count = self.shards.max(1).checked_next_power_of_two().ok_or_else(|| {
            Error::Config(format!("shard count {} is too large", self.shards))
        })?;

        if self.capacity == 0 {
            return Ok(Layout {
                shard_count,
                shard_capacity: 0,
                lost_capacity: 0,
            });
        }

        // A zero per-shard capacity would read as unbounded.
        if self.capacity < shard_count {
            return Err(Error::Config(format!(
                "capacity {} is smaller than shard count {}",
                self.capacity, shard_count
            )));
        }

        Ok(Layout {
            shard_count,
            shard_capacity: self.capacity / shard_count,
            lost_capacity: self.capacity % shard_count,
        })
    }
}

impl Layout {
    /// Layout of a zero-value cache materialized on first use
    pub(crate) fn single(capacity: usize) -> Self {
        Self {
            shard_count: 1,
            shard_capacity: capacity,
            lost_capacity: 0,
        }
    }

    /// Total usable capacity (0 = unbounded)
    pub fn effective_capacity(&self) -> usize {
        self.shard_capacity * self.shard_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_single_unbounded_shard() {
        let layout = Options::new().resolve().unwrap();

        assert_eq!(layout.shard_count, 1);
        assert_eq!(layout.shard_capacity, 0);
        assert_eq!(layout.effective_capacity(), 0);
    }

    #[test]
    fn test_shards_round_up_to_power_of_two() {
        for (requested, expected) in [(0, 1), (1, 1), (2, 2), (3, 4), (5, 8), (16, 16), (17, 32)] {
            let layout = Options::new().with_shards(requested).resolve().unwrap();
            assert_eq!(layout.shard_count, expected, "requested {}", requested);
        }
    }

    #[test]
    fn test_capacity_floor_division() {
        let layout = Options::new().with_capacity(10).with_shards(4).resolve().unwrap();

        assert_eq!(layout.shard_capacity, 2);
        assert_eq!(layout.lost_capacity, 2);
        assert_eq!(layout.effective_capacity(), 8);
    }

    #[test]
    fn test_capacity_below_shard_count_rejected() {
        let result = Options::new().with_capacity(3).with_shards(4).resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_oversized_shard_count_rejected() {
        let result = Options::new().with_shards(usize::MAX).resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_deserialize_partial_options() {
        let opts: Options = serde_json::from_str(r#"{"capacity":100}"#).unwrap();
        assert_eq!(opts, Options::new().with_capacity(100));

        let opts: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, Options::default());
    }
}
