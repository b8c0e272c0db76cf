//! Routing rule definitions as supplied by the store.
//!
//! Operators and action types stay raw strings here; they are parsed when a
//! snapshot is compiled so one bad rule cannot fail the whole store load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::within_window;

/// Rule lifecycle status. Only `Active` rules enter a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Draft,
    Active,
    Suspended,
    Retired,
}

/// Broad purpose of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    #[default]
    #[serde(alias = "payment-routing")]
    PaymentRouting,
    #[serde(alias = "risk-gate")]
    RiskGate,
    Enrichment,
    #[serde(other)]
    Other,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::PaymentRouting => "payment_routing",
            RuleCategory::RiskGate => "risk_gate",
            RuleCategory::Enrichment => "enrichment",
            RuleCategory::Other => "other",
        }
    }
}

/// How a condition's result joins the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    #[serde(alias = "AND", alias = "&&")]
    And,
    #[serde(alias = "OR", alias = "||")]
    Or,
}

/// A single test against one context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Evaluation position within the rule.
    #[serde(default)]
    pub order: u32,
    /// Dot path into the request context.
    pub field: String,
    pub operator: String,
    /// Comparison value, or an array for set membership.
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub negate: bool,
    /// Ignored on the last condition.
    #[serde(default)]
    pub combinator: Combinator,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            order: 0,
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            negate: false,
            combinator: Combinator::And,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn then(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }
}

/// A step that shapes the routing decision once a rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub order: u32,
    #[serde(rename = "type", alias = "action_type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Marks the headline action of the rule.
    #[serde(default)]
    pub primary: bool,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            order: 0,
            action_type: action_type.into(),
            parameters: Map::new(),
            primary: false,
        }
    }

    pub fn set_route(route: impl Into<String>) -> Self {
        Self::new("set_route").param("route", route.into()).primary()
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self::new("reject").param("reason", reason.into()).primary()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// A prioritized, conditional routing rule.
///
/// Rules are replaced whole; there is no partial mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: RuleCategory,
    /// Lower values evaluate first; ties keep insertion order.
    #[serde(default)]
    pub priority: i32,
    pub status: RuleStatus,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
}

impl RoutingRule {
    pub fn new(id: impl Into<String>, priority: i32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: RuleCategory::PaymentRouting,
            priority,
            status: RuleStatus::Active,
            conditions: Vec::new(),
            actions: Vec::new(),
            effective_from: None,
            effective_until: None,
        }
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a condition; its order index follows the existing ones.
    pub fn when(mut self, mut condition: Condition) -> Self {
        condition.order = self.conditions.len() as u32;
        self.conditions.push(condition);
        self
    }

    /// Append an action; its order index follows the existing ones.
    pub fn then(mut self, mut action: Action) -> Self {
        action.order = self.actions.len() as u32;
        self.actions.push(action);
        self
    }

    pub fn effective_between(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.effective_from = from;
        self.effective_until = until;
        self
    }

    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        within_window(self.effective_from, self.effective_until, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_rule_deserialize() {
        let rule: RoutingRule = serde_json::from_value(json!({
            "id": "R1",
            "category": "risk-gate",
            "priority": 10,
            "status": "active",
            "conditions": [
                {"field": "amount", "operator": ">", "value": 1000, "combinator": "OR"}
            ],
            "actions": [
                {"type": "set_route", "parameters": {"route": "HIGH_VALUE"}, "primary": true}
            ]
        }))
        .unwrap();

        assert_eq!(rule.category, RuleCategory::RiskGate);
        assert_eq!(rule.conditions[0].combinator, Combinator::Or);
        assert_eq!(rule.actions[0].action_type, "set_route");
        assert!(rule.effective_until.is_none());
    }

    #[test]
    fn test_unknown_category() {
        let rule: RoutingRule = serde_json::from_value(json!({
            "id": "R2", "status": "draft", "category": "fx_pricing"
        }))
        .unwrap();
        assert_eq!(rule.category, RuleCategory::Other);
    }

    #[test]
    fn test_builder_orders() {
        let rule = RoutingRule::new("R1", 1)
            .when(Condition::new("a", "eq", 1))
            .when(Condition::new("b", "eq", 2))
            .then(Action::set_route("X"));
        assert_eq!(rule.conditions[1].order, 1);
        assert_eq!(rule.actions[0].order, 0);
    }

    #[test]
    fn test_effective_window() {
        let now = Utc::now();
        let rule = RoutingRule::new("R1", 1)
            .effective_between(None, Some(now - Duration::seconds(1)));
        assert!(!rule.is_effective_at(now));
    }
}
