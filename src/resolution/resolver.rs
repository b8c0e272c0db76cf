//! Most-specific-wins configuration lookup.
//!
//! # Responsibilities
//! - Pick the effective entry for a setting and context from one snapshot
//! - Break same-level ties deterministically
//! - Hold registered per-setting defaults
//!
//! # Design Decisions
//! - Same-level ties: latest `effective_from`, then latest `updated_at`,
//!   then the entry loaded later (absent timestamps sort oldest)
//! - A context without a key for a level can never match entries at that level

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ResolveError;
use crate::model::{RequestContext, ScopeLevel, ScopedConfiguration};
use crate::snapshot::Snapshot;

/// A resolved value and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub value: Value,
    pub level: ScopeLevel,
    pub entry_id: String,
}

/// Defaults registered per setting name, used when nothing in the snapshot matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingDefaults {
    values: BTreeMap<String, Value>,
}

impl SettingDefaults {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn register(&mut self, setting: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(setting.into(), value.into());
    }

    pub fn get(&self, setting: &str) -> Option<&Value> {
        self.values.get(setting)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for SettingDefaults {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self::new(values)
    }
}

/// Resolves settings against one snapshot at one instant.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    snapshot: &'a Snapshot,
    now: DateTime<Utc>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            now: Utc::now(),
        }
    }

    /// Resolve as of a fixed instant instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// The most specific effective entry for `setting`, if any.
    pub fn resolve(
        &self,
        setting: &str,
        ctx: &RequestContext,
    ) -> Result<Option<Resolution>, ResolveError> {
        validate_name(setting)?;
        Ok(self.winning_entry(setting, ctx).map(|entry| Resolution {
            value: entry.value.clone(),
            level: entry.level,
            entry_id: entry.id.clone(),
        }))
    }

    fn winning_entry(&self, setting: &str, ctx: &RequestContext) -> Option<&'a ScopedConfiguration> {
        let candidates: Vec<&ScopedConfiguration> = self
            .snapshot
            .configurations_for(setting)
            .iter()
            .filter(|entry| entry.is_effective_at(self.now) && entry.applies_to(ctx))
            .collect();

        ScopeLevel::RANKED.iter().find_map(|level| {
            candidates
                .iter()
                .copied()
                .filter(|entry| entry.level == *level)
                // `max_by` keeps the last of equal elements, i.e. the later-loaded entry.
                .max_by(|a, b| tie_break(a, b))
        })
    }
}

/// Within one level: a tenant-qualified key beats a bare one, then the latest
/// `effective_from`, then the latest `updated_at`.
fn tie_break(a: &ScopedConfiguration, b: &ScopedConfiguration) -> Ordering {
    a.scope_key
        .tenant
        .is_some()
        .cmp(&b.scope_key.tenant.is_some())
        .then_with(|| a.effective_from.cmp(&b.effective_from))
        .then_with(|| a.updated_at.cmp(&b.updated_at))
}

fn validate_name(setting: &str) -> Result<(), ResolveError> {
    if setting.trim().is_empty() || setting.chars().any(char::is_control) {
        return Err(ResolveError::InvalidSettingName(setting.to_string()));
    }
    Ok(())
}
