//! Immutable, versioned bundle of rules and configuration entries.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{LoadError, MalformedRule};
use crate::model::{RoutingRule, RuleStatus, ScopedConfiguration};
use crate::routing::CompiledRule;

/// Everything an evaluation reads. Never mutated after construction.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    rules: Vec<CompiledRule>,
    /// Entries per setting, in store order.
    configurations: HashMap<String, Vec<ScopedConfiguration>>,
    configuration_count: usize,
    warnings: Vec<MalformedRule>,
    /// Sorted effective-window edges across rules and entries.
    boundaries: Vec<DateTime<Utc>>,
}

impl Snapshot {
    /// Generation zero: no rules, no entries.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            rules: Vec::new(),
            configurations: HashMap::new(),
            configuration_count: 0,
            warnings: Vec::new(),
            boundaries: Vec::new(),
        }
    }

    /// Validate and compile store data.
    ///
    /// Store-level problems (duplicate rule ids, unnamed settings) fail the
    /// whole build. A rule that fails to compile is left out and reported in
    /// `warnings`. Only active rules are kept, stably sorted by priority.
    pub fn build(
        generation: u64,
        rules: Vec<RoutingRule>,
        configurations: Vec<ScopedConfiguration>,
    ) -> Result<Self, LoadError> {
        validate(&rules, &configurations)?;

        let mut compiled = Vec::new();
        let mut warnings = Vec::new();
        for rule in rules.iter().filter(|r| r.status == RuleStatus::Active) {
            match CompiledRule::compile(rule) {
                Ok(rule) => compiled.push(rule),
                Err(warning) => warnings.push(warning),
            }
        }
        compiled.sort_by_key(|rule| rule.priority);

        let mut boundaries: Vec<DateTime<Utc>> = compiled
            .iter()
            .flat_map(|r| [r.effective_from, r.effective_until])
            .chain(
                configurations
                    .iter()
                    .flat_map(|c| [c.effective_from, c.effective_until]),
            )
            .flatten()
            .collect();
        boundaries.sort();
        boundaries.dedup();

        let configuration_count = configurations.len();
        let mut by_setting: HashMap<String, Vec<ScopedConfiguration>> = HashMap::new();
        for mut entry in configurations {
            if entry.id.is_empty() {
                entry.id = format!("{}@{}:{}", entry.setting, entry.level, entry.scope_key);
            }
            by_setting.entry(entry.setting.clone()).or_default().push(entry);
        }

        Ok(Self {
            generation,
            built_at: Utc::now(),
            rules: compiled,
            configurations: by_setting,
            configuration_count,
            warnings,
            boundaries,
        })
    }

    /// Stamp the generation assigned at publish time.
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Active rules in evaluation order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Entries for one setting, in store order.
    pub fn configurations_for(&self, setting: &str) -> &[ScopedConfiguration] {
        self.configurations
            .get(setting)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn configuration_count(&self) -> usize {
        self.configuration_count
    }

    pub fn warnings(&self) -> &[MalformedRule] {
        &self.warnings
    }

    /// The next instant after `now` at which some rule or entry enters or leaves
    /// its effective window. Results computed at `now` hold until then.
    pub fn next_boundary_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let idx = self.boundaries.partition_point(|b| *b <= now);
        self.boundaries.get(idx).copied()
    }
}

fn validate(rules: &[RoutingRule], configurations: &[ScopedConfiguration]) -> Result<(), LoadError> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for rule in rules {
        if rule.id.trim().is_empty() {
            errors.push("rule with empty id".to_string());
        } else if !seen.insert(rule.id.as_str()) {
            errors.push(format!("duplicate rule id `{}`", rule.id));
        }
    }

    for entry in configurations {
        if entry.setting.trim().is_empty() {
            errors.push(format!("configuration entry `{}` has an empty setting name", entry.id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ScopeKey, ScopeLevel};
    use chrono::Duration;

    #[test]
    fn test_empty_rule_set_is_valid() {
        let snap = Snapshot::build(4, Vec::new(), Vec::new()).unwrap();
        assert_eq!(snap.generation(), 4);
        assert!(snap.rules().is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rules = vec![RoutingRule::new("R1", 1), RoutingRule::new("R1", 2)];
        match Snapshot::build(1, rules, Vec::new()) {
            Err(LoadError::Validation(errors)) => assert!(errors[0].contains("R1")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_retired_rules_excluded() {
        let rules = vec![
            RoutingRule::new("old", 1)
                .with_status(RuleStatus::Retired)
                .then(Action::set_route("OLD")),
            RoutingRule::new("live", 2).then(Action::set_route("LIVE")),
        ];
        let snap = Snapshot::build(1, rules, Vec::new()).unwrap();
        assert!(snap.rule("old").is_none());
        assert!(snap.rule("live").is_some());
    }

    #[test]
    fn test_boundaries() {
        let now = Utc::now();
        let soon = now + Duration::minutes(5);
        let later = now + Duration::hours(1);
        let rules = vec![RoutingRule::new("R1", 1).effective_between(None, Some(later))];
        let configs = vec![ScopedConfiguration::new("s", ScopeLevel::Tenant, ScopeKey::new("t"), 1)
            .effective_between(Some(soon), None)];
        let snap = Snapshot::build(1, rules, configs).unwrap();

        assert_eq!(snap.next_boundary_after(now), Some(soon));
        assert_eq!(snap.next_boundary_after(soon), Some(later));
        assert_eq!(snap.next_boundary_after(later), None);
        assert_eq!(snap.configurations_for("s").len(), 1);
        assert!(snap.configurations_for("other").is_empty());
    }
}
