//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (scope keys + attributes)
//!     → engine.rs (priority-ordered scan of the snapshot's rules)
//!     → condition.rs (evaluate the rule's condition chain)
//!     → action.rs (apply the first matching rule's actions)
//!     → Return: RoutingDecision (matched or default)
//!
//! Rule Compilation (per snapshot):
//!     RoutingRule[]
//!     → Drop non-active rules
//!     → Stable sort by priority
//!     → Compile conditions (operators, regexes) and actions
//!     → Freeze inside an immutable Snapshot
//! ```
//!
//! # Design Decisions
//! - Rules compiled once per snapshot, immutable at runtime
//! - Deterministic: same input and snapshot always give the same decision
//! - First match wins (ordered by ascending priority)

pub mod action;
pub mod condition;
pub mod engine;

pub use engine::{CompiledRule, RuleEngine};
