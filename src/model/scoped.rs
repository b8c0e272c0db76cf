//! Scoped configuration entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::context::RequestContext;
use crate::model::within_window;

/// How specific a configuration entry is.
///
/// Declaration order is specificity order: `Tenant` is the least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Tenant,
    #[serde(alias = "payment-type")]
    PaymentType,
    #[serde(alias = "local-instrument")]
    LocalInstrument,
    #[serde(alias = "clearing-system")]
    ClearingSystem,
}

impl ScopeLevel {
    /// Precedence table, most specific first.
    pub const RANKED: [ScopeLevel; 4] = [
        ScopeLevel::ClearingSystem,
        ScopeLevel::LocalInstrument,
        ScopeLevel::PaymentType,
        ScopeLevel::Tenant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeLevel::Tenant => "tenant",
            ScopeLevel::PaymentType => "payment_type",
            ScopeLevel::LocalInstrument => "local_instrument",
            ScopeLevel::ClearingSystem => "clearing_system",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifying value of an entry at its level, optionally tenant-qualified.
///
/// Written as `SWIFT` or `tenant-A/SWIFT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeKey {
    pub tenant: Option<String>,
    pub value: String,
}

impl ScopeKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            tenant: None,
            value: value.into(),
        }
    }

    pub fn qualified(tenant: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            value: value.into(),
        }
    }
}

impl TryFrom<String> for ScopeKey {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let key = match raw.split_once('/') {
            Some((tenant, value)) => ScopeKey::qualified(tenant.trim(), value.trim()),
            None => ScopeKey::new(raw.trim()),
        };
        let tenant_empty = key.tenant.as_deref().is_some_and(str::is_empty);
        if key.value.is_empty() || tenant_empty || key.value.contains('/') {
            return Err(format!("invalid scope key {raw:?}"));
        }
        Ok(key)
    }
}

impl From<ScopeKey> for String {
    fn from(key: ScopeKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(tenant) => write!(f, "{}/{}", tenant, self.value),
            None => f.write_str(&self.value),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One value for a named setting at one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedConfiguration {
    #[serde(default)]
    pub id: String,
    pub setting: String,
    pub level: ScopeLevel,
    pub scope_key: ScopeKey,
    pub value: Value,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScopedConfiguration {
    pub fn new(
        setting: impl Into<String>,
        level: ScopeLevel,
        scope_key: ScopeKey,
        value: impl Into<Value>,
    ) -> Self {
        let setting = setting.into();
        Self {
            id: format!("{}@{}:{}", setting, level, scope_key),
            setting,
            level,
            scope_key,
            value: value.into(),
            effective_from: None,
            effective_until: None,
            enabled: true,
            updated_at: None,
        }
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

    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Enabled and inside its effective window.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && within_window(self.effective_from, self.effective_until, now)
    }

    /// True when the context supplies a matching key for this entry's level.
    pub fn applies_to(&self, ctx: &RequestContext) -> bool {
        let Some(value) = ctx.scope_key(self.level) else {
            return false;
        };
        if value != self.scope_key.value {
            return false;
        }
        match &self.scope_key.tenant {
            Some(tenant) => ctx.tenant.as_deref() == Some(tenant.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_ordering() {
        assert!(ScopeLevel::ClearingSystem > ScopeLevel::LocalInstrument);
        assert!(ScopeLevel::PaymentType > ScopeLevel::Tenant);
        assert_eq!(ScopeLevel::RANKED[0], ScopeLevel::ClearingSystem);
    }

    #[test]
    fn test_scope_key_parse() {
        let key = ScopeKey::try_from("tenant-A/SWIFT".to_string()).unwrap();
        assert_eq!(key, ScopeKey::qualified("tenant-A", "SWIFT"));
        assert_eq!(key.to_string(), "tenant-A/SWIFT");

        assert!(ScopeKey::try_from("".to_string()).is_err());
        assert!(ScopeKey::try_from("/SWIFT".to_string()).is_err());
        assert!(ScopeKey::try_from("a/b/c".to_string()).is_err());
    }

    #[test]
    fn test_applies_to_qualified_key() {
        let entry = ScopedConfiguration::new(
            "fraud-check-enabled",
            ScopeLevel::ClearingSystem,
            ScopeKey::qualified("tenant-A", "SWIFT"),
            false,
        );
        let ctx = RequestContext::new()
            .with_tenant("tenant-A")
            .with_clearing_system("SWIFT");
        assert!(entry.applies_to(&ctx));
        assert!(!entry.applies_to(&ctx.clone().with_tenant("tenant-B")));
        assert!(!entry.applies_to(&RequestContext::new().with_tenant("tenant-A")));
    }

    #[test]
    fn test_deserialize_entry() {
        let entry: ScopedConfiguration = serde_json::from_value(json!({
            "setting": "fraud-check-enabled",
            "level": "clearing-system",
            "scope_key": "tenant-A/SWIFT",
            "value": false,
            "effective_from": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(entry.enabled);
        assert_eq!(entry.level, ScopeLevel::ClearingSystem);
        assert!(entry.effective_from.is_some());
    }
}
