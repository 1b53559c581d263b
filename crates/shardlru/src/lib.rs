//! # shardlru
//!
//! Sharded, thread-safe LRU cache.
//!
//! ## Architecture
//! - **Router**: FNV-1a over a key's byte form picks a shard with a bitmask
//! - **Shard**: `parking_lot::Mutex` around a slot-arena recency list and an
//!   AHash key index; O(1) insert, lookup, removal and eviction
//! - **LruCache**: fixed array of shards built once from [`Options`], or
//!   lazily as a single shard for zero-value caches
//!
//! ## Guarantees
//! - Capacity is enforced per shard (`capacity / shard_count` each)
//! - Recency is per shard; whole-cache traversal concatenates shard orders
//! - Keys that cannot be encoded fail with [`Error::Encoding`] and touch no
//!   shard

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod list;
pub mod router;
mod shard;
mod stats;

pub use cache::LruCache;
pub use config::{Layout, Options};
pub use error::{Error, Result};
pub use list::Direction;
pub use router::{ByteView, RouteKey, Strategy, Structural, Textual};
pub use stats::CacheStats;
