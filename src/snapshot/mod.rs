//! Snapshot subsystem.
//!
//! # Data Flow
//! ```text
//! StoreAdapter (memory / file)
//!     → manager.rs (load, validate, compile into a Snapshot)
//!     → state.rs (immutable rules + configurations + window boundaries)
//!     → ArcSwap publish, generation += 1
//!     → readers: routing engine, config resolver, decision cache
//!
//! Reload triggers:
//!     ReloadHandle::request / store change feed / periodic tick
//!     → reload.rs (coalesce, retry with backoff)
//!     → manager.rs
//! ```
//!
//! # Design Decisions
//! - A snapshot is never mutated after publish
//! - A failed load never replaces the published snapshot
//! - Evaluations pin one snapshot for their whole duration

pub mod manager;
pub mod reload;
pub mod state;
pub mod store;

pub use manager::{ReloadReport, SnapshotManager};
pub use reload::{ReloadHandle, ReloadReason, Reloader};
pub use state::Snapshot;
pub use store::{FileStore, InMemoryStore, StoreAdapter, StoreDocument, StoreWatch};
