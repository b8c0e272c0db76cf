//! Decision cache subsystem.
//!
//! # Data Flow
//! ```text
//! DecisionService call
//!     → CacheKey { generation, kind, scope keys, context hash }
//!     → decision_cache.rs lookup
//!         hit  (same generation, fingerprint equal, not expired) → cached value
//!         miss → evaluate against the pinned snapshot → insert
//!
//! On publish:
//!     generation watch fires → purge_stale(generation) off the request path
//! ```
//!
//! # Design Decisions
//! - Generation tagging instead of write-driven invalidation
//! - The cache is an optimization only; every failure is a miss
//! - Expiry never crosses an effective-window boundary of the snapshot

pub mod decision_cache;

pub use decision_cache::{CacheKey, CacheKind, CachedValue, DecisionCache};
