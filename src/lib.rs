//! Payment rules engine library.
//!
//! Hierarchical configuration resolution and first-match-wins rule routing
//! over immutable, hot-reloadable snapshots.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod resilience;
pub mod resolution;
pub mod routing;
pub mod service;
pub mod snapshot;

pub use config::EngineConfig;
pub use error::{CacheError, LoadError, MalformedRule, ResolveError};
pub use lifecycle::Shutdown;
pub use model::{RequestContext, RoutingDecision};
pub use service::DecisionService;
