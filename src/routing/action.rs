//! Action execution.
//!
//! # Responsibilities
//! - Compile store actions into typed steps
//! - Apply the steps of a matched rule, in order, to a decision
//!
//! # Design Decisions
//! - `set_route` and `reject` are the primary actions; the last one applied wins
//! - `reject` marks the decision terminal and stops the remaining steps
//! - Metadata merge is a shallow union of literal values; later keys overwrite earlier ones

use serde_json::{Map, Value};

use crate::model::{Action, RoutingDecision};

/// An action ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledAction {
    SetRoute(String),
    SetPriorityTag(String),
    MergeMetadata(Map<String, Value>),
    Reject(Option<String>),
}

impl CompiledAction {
    pub fn compile(action: &Action) -> Result<Self, String> {
        let kind = action.action_type.trim().to_ascii_lowercase().replace('-', "_");
        match kind.as_str() {
            "set_route" => required_str(action, "route").map(CompiledAction::SetRoute),
            "set_priority_tag" => required_str(action, "tag").map(CompiledAction::SetPriorityTag),
            "merge_metadata" => Ok(CompiledAction::MergeMetadata(action.parameters.clone())),
            "reject" => Ok(CompiledAction::Reject(
                action
                    .parameters
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            )),
            _ => Err(format!("unknown action type `{}`", action.action_type)),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, CompiledAction::SetRoute(_) | CompiledAction::Reject(_))
    }
}

fn required_str(action: &Action, key: &str) -> Result<String, String> {
    action
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("`{}` action needs a string `{}` parameter", action.action_type, key))
}

/// Compile a rule's actions, sorted by order index (stable on ties).
pub fn compile_actions(actions: &[Action]) -> Result<Vec<CompiledAction>, String> {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    ordered.sort_by_key(|a| a.order);
    ordered.into_iter().map(CompiledAction::compile).collect()
}

/// Run actions in order against a decision started for the matching rule.
pub fn apply(actions: &[CompiledAction], mut decision: RoutingDecision) -> RoutingDecision {
    for action in actions {
        match action {
            CompiledAction::SetRoute(route) => {
                decision.route = Some(route.clone());
            }
            CompiledAction::SetPriorityTag(tag) => {
                decision.priority_tag = Some(tag.clone());
            }
            CompiledAction::MergeMetadata(entries) => {
                for (key, value) in entries {
                    decision.metadata.insert(key.clone(), value.clone());
                }
            }
            CompiledAction::Reject(reason) => {
                decision.route = None;
                decision.terminal = true;
                decision.reject_reason = reason.clone();
                break;
            }
        }
    }
    decision
}
