//! Hierarchical setting resolution.
//!
//! # Data Flow
//! ```text
//! (setting name, RequestContext)
//!     → resolver.rs
//!         → entries for the setting in the pinned Snapshot
//!         → keep enabled + in-window + scope key supplied by the context
//!         → walk ScopeLevel::RANKED (most specific first)
//!         → tie-break within the winning level
//!     → Resolution { value, level, entry_id } or nothing
//!     → caller default / SettingDefaults
//! ```
//!
//! # Design Decisions
//! - Precedence is defined once, by `ScopeLevel::RANKED`
//! - "Not configured" is never an error; only unusable input is

pub mod resolver;

pub use resolver::{ConfigResolver, Resolution, SettingDefaults};
