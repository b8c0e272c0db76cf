//! Domain model shared by every subsystem.
//!
//! # Design Decisions
//! - Store-facing types are plain serde structs; compiled forms live in `routing`
//! - Effective windows are half-open: `[from, until)`, open when a bound is absent

use chrono::{DateTime, Utc};

pub mod context;
pub mod decision;
pub mod rule;
pub mod scoped;

pub use context::RequestContext;
pub use decision::{RoutingDecision, NO_MATCH};
pub use rule::{Action, Combinator, Condition, RoutingRule, RuleCategory, RuleStatus};
pub use scoped::{ScopeKey, ScopeLevel, ScopedConfiguration};

/// True when `now` falls inside `[from, until)`.
pub fn within_window(
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    from.map_or(true, |from| from <= now) && until.map_or(true, |until| now < until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        assert!(within_window(None, None, now));
        assert!(within_window(Some(now), None, now));
        assert!(!within_window(None, Some(now), now));
        assert!(!within_window(Some(now + Duration::seconds(5)), None, now));
    }
}
