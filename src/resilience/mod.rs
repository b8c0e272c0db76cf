//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot reload attempt fails (store unreachable / malformed data):
//!     → backoff.rs (exponential delay + jitter)
//!     → snapshot::reload retries until max_attempts
//!     → previous snapshot stays published throughout
//! ```
//!
//! # Design Decisions
//! - Only the load path retries; the evaluation path never waits on I/O
//! - Jitter spreads retries from many engines sharing one store

pub mod backoff;

pub use backoff::calculate_backoff;
