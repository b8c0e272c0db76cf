//! First-match-wins rule evaluation.
//!
//! # Responsibilities
//! - Compile store rules into immutable, evaluation-ready form
//! - Scan a snapshot's rules in priority order and apply the first match
//! - Return the caller's default decision when nothing matches
//!
//! # Design Decisions
//! - Immutable inputs: the engine only borrows a published snapshot
//! - Rules that fail to compile never reach a snapshot (skipped with a warning)
//! - Explicit default decision rather than an absent result

use chrono::{DateTime, Utc};

use crate::error::MalformedRule;
use crate::model::{RequestContext, RoutingDecision, RoutingRule, RuleCategory};
use crate::routing::action::{self, compile_actions, CompiledAction};
use crate::routing::condition::{self, compile_conditions, CompiledCondition};
use crate::snapshot::Snapshot;

/// A rule with parsed operators and actions.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub category: RuleCategory,
    pub priority: i32,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<DateTime<Utc>>,
    conditions: Vec<CompiledCondition>,
    actions: Vec<CompiledAction>,
}

impl CompiledRule {
    pub fn compile(rule: &RoutingRule) -> Result<Self, MalformedRule> {
        let conditions =
            compile_conditions(&rule.conditions).map_err(|e| MalformedRule::new(&rule.id, e))?;
        let actions = compile_actions(&rule.actions).map_err(|e| MalformedRule::new(&rule.id, e))?;

        let primaries = actions.iter().filter(|a| a.is_primary()).count();
        if primaries > 1 {
            tracing::debug!(
                rule_id = %rule.id,
                primaries,
                "Rule defines several primary actions; the last one applied wins"
            );
        }

        Ok(Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            category: rule.category,
            priority: rule.priority,
            effective_from: rule.effective_from,
            effective_until: rule.effective_until,
            conditions,
            actions,
        })
    }

    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        crate::model::within_window(self.effective_from, self.effective_until, now)
    }

    pub fn matches(&self, ctx: &RequestContext) -> bool {
        condition::evaluate(&self.conditions, ctx)
    }

    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[CompiledAction] {
        &self.actions
    }
}

/// Evaluates one snapshot at one instant.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    snapshot: &'a Snapshot,
    now: DateTime<Utc>,
}

impl<'a> RuleEngine<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            now: Utc::now(),
        }
    }

    /// Evaluate as of a fixed instant instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Route across every rule category.
    pub fn evaluate(&self, ctx: &RequestContext, default_route: &str) -> RoutingDecision {
        self.decide(self.first_match(ctx, None), default_route)
    }

    /// Route considering only rules of one category.
    pub fn evaluate_category(
        &self,
        ctx: &RequestContext,
        category: RuleCategory,
        default_route: &str,
    ) -> RoutingDecision {
        self.decide(self.first_match(ctx, Some(category)), default_route)
    }

    /// First effective rule, in priority order, whose conditions hold.
    pub fn first_match(
        &self,
        ctx: &RequestContext,
        category: Option<RuleCategory>,
    ) -> Option<&'a CompiledRule> {
        self.snapshot
            .rules()
            .iter()
            .filter(|rule| category.map_or(true, |c| rule.category == c))
            .filter(|rule| rule.is_effective_at(self.now))
            .find(|rule| rule.matches(ctx))
    }

    fn decide(
        &self,
        matched: Option<&CompiledRule>,
        default_route: &str,
    ) -> RoutingDecision {
        let generation = self.snapshot.generation();
        match matched {
            Some(rule) => {
                tracing::trace!(rule_id = %rule.id, generation, "Rule matched");
                action::apply(rule.actions(), RoutingDecision::for_rule(&rule.id, generation))
            }
            None => RoutingDecision::default_route(default_route, generation),
        }
    }
}
