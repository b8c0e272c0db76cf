//! Request context handed in by the payment pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::scoped::ScopeLevel;

/// Everything the engine knows about one inbound payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestContext {
    pub tenant: Option<String>,
    pub payment_type: Option<String>,
    pub local_instrument: Option<String>,
    pub clearing_system: Option<String>,
    /// Arbitrary payment attributes (amount, currency, debtor, ...).
    pub attributes: Map<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = Some(payment_type.into());
        self
    }

    pub fn with_local_instrument(mut self, local_instrument: impl Into<String>) -> Self {
        self.local_instrument = Some(local_instrument.into());
        self
    }

    pub fn with_clearing_system(mut self, clearing_system: impl Into<String>) -> Self {
        self.clearing_system = Some(clearing_system.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The identifying value this context supplies for a scope level, if any.
    pub fn scope_key(&self, level: ScopeLevel) -> Option<&str> {
        match level {
            ScopeLevel::Tenant => self.tenant.as_deref(),
            ScopeLevel::PaymentType => self.payment_type.as_deref(),
            ScopeLevel::LocalInstrument => self.local_instrument.as_deref(),
            ScopeLevel::ClearingSystem => self.clearing_system.as_deref(),
        }
    }

    /// Resolve a dot-addressed field.
    ///
    /// Scope field names map to the typed fields; anything else walks
    /// `attributes`. Numeric segments index into arrays.
    pub fn field(&self, path: &str) -> Option<Value> {
        let scoped = match path {
            "tenant" => Some(&self.tenant),
            "payment_type" | "paymentType" => Some(&self.payment_type),
            "local_instrument" | "localInstrument" => Some(&self.local_instrument),
            "clearing_system" | "clearingSystem" => Some(&self.clearing_system),
            _ => None,
        };
        if let Some(field) = scoped {
            return field.clone().map(Value::String);
        }

        let path = path.strip_prefix("attributes.").unwrap_or(path);
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.attributes.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            return None;
        }
        Some(current.clone())
    }
}
