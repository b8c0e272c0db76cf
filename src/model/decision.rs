//! Routing decision returned to the payment pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier reported when no rule matched.
pub const NO_MATCH: &str = "no-match";

/// Outcome of routing one request. Never absent: no match yields the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Rule that produced the decision; `None` for the default decision.
    pub matched_rule: Option<String>,
    /// Resolved route / clearing path.
    pub route: Option<String>,
    pub priority_tag: Option<String>,
    /// Metadata to attach downstream.
    pub metadata: BTreeMap<String, Value>,
    /// True when a reject fired; downstream processing must halt.
    pub terminal: bool,
    pub reject_reason: Option<String>,
    /// Snapshot generation the decision was computed against.
    pub generation: u64,
}

impl RoutingDecision {
    /// The non-terminal decision used when nothing matches.
    pub fn default_route(route: impl Into<String>, generation: u64) -> Self {
        Self {
            matched_rule: None,
            route: Some(route.into()),
            priority_tag: None,
            metadata: BTreeMap::new(),
            terminal: false,
            reject_reason: None,
            generation,
        }
    }

    /// Empty decision attributed to a matching rule, before its actions run.
    pub fn for_rule(rule_id: impl Into<String>, generation: u64) -> Self {
        Self {
            matched_rule: Some(rule_id.into()),
            route: None,
            priority_tag: None,
            metadata: BTreeMap::new(),
            terminal: false,
            reject_reason: None,
            generation,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched_rule.is_some()
    }

    /// Matched rule id or the `no-match` sentinel.
    pub fn matched_rule_id(&self) -> &str {
        self.matched_rule.as_deref().unwrap_or(NO_MATCH)
    }
}
