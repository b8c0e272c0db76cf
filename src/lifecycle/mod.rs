//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Store → DecisionService → first snapshot (fatal on failure)
//!     → Reloader + store watch + cache janitor + signal listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → tasks leave their loops → Engine::wait returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Request snapshot reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the first snapshot, then background tasks
//! - Evaluation never waits on lifecycle; only background tasks observe shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, start, Engine, StartupError};
