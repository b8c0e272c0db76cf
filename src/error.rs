//! Error taxonomy for the engine.
//!
//! # Design Decisions
//! - Load-path errors are surfaced: they affect every later evaluation
//! - Evaluation-path problems are recovered locally (skip rule, cache miss)
//! - "No match" is never an error; it has a representable default outcome

use thiserror::Error;

/// Failure to build a new snapshot from the store (ConfigurationLoadError).
///
/// The previous snapshot stays active whenever one of these is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The store could not be reached or read.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that cannot be decoded.
    #[error("malformed store data: {0}")]
    Malformed(String),

    /// Decoded data violated a store-level invariant.
    #[error("store validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// A load that started later already published; this older read was dropped.
    #[error("superseded by a newer load (generation {generation} is current)")]
    Superseded { generation: u64 },
}

/// A rule that failed to compile and was left out of a snapshot.
///
/// This is a warning value, not an error path: evaluation continues with the
/// remaining rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule `{rule_id}` skipped: {reason}")]
pub struct MalformedRule {
    pub rule_id: String,
    pub reason: String,
}

impl MalformedRule {
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by setting resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No entry matched and no default is registered for the setting.
    #[error("unknown setting `{0}`: no matching entry and no registered default")]
    UnknownSetting(String),

    /// The setting name itself is unusable.
    #[error("invalid setting name {0:?}")]
    InvalidSettingName(String),
}

/// Cache failures. These never reach callers; every variant degrades to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to fingerprint context: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("cache full ({0} entries)")]
    Full(usize),
}

/// A statistics sink refused an event. Counted and dropped, never propagated.
#[derive(Debug, Clone, Error)]
#[error("stats sink failed: {0}")]
pub struct SinkError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "store validation failed: a, b");

        let warn = MalformedRule::new("r1", "unknown operator `like`");
        assert_eq!(warn.to_string(), "rule `r1` skipped: unknown operator `like`");

        let err = ResolveError::UnknownSetting("fraud-check-enabled".into());
        assert!(err.to_string().contains("fraud-check-enabled"));
    }
}
