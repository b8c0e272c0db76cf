//! In-process statistics and the external decision-event sink.
//!
//! # Responsibilities
//! - Count evaluations, per-rule matches, resolutions and cache outcomes
//! - Track latency (total and max) and reload outcomes
//! - Emit one `DecisionEvent` per call to an optional `StatsSink`
//!
//! # Design Decisions
//! - Atomics and a concurrent map: recording never takes a global lock
//! - A failing sink is counted and logged at debug, nothing more

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SinkError;
use crate::model::{RoutingDecision, ScopeLevel};
use crate::observability::metrics;

/// What a decision event describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventKind {
    Route,
    Setting { name: String },
}

/// One routing or resolution call, as reported to a `StatsSink`.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEvent {
    pub event_id: Uuid,
    pub kind: EventKind,
    /// Matched rule id (routing) or winning entry id (settings), else `no-match`.
    pub rule_id: String,
    #[serde(rename = "latency_us", serialize_with = "as_micros")]
    pub latency: Duration,
    pub cache_hit: bool,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

impl DecisionEvent {
    pub fn new(
        kind: EventKind,
        rule_id: impl Into<String>,
        latency: Duration,
        cache_hit: bool,
        generation: u64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            rule_id: rule_id.into(),
            latency,
            cache_hit,
            generation,
            timestamp: Utc::now(),
        }
    }
}

/// External collaborator receiving decision events. Called on the request
/// path, so implementations should hand off rather than block.
pub trait StatsSink: Send + Sync {
    fn record(&self, event: &DecisionEvent) -> Result<(), SinkError>;
}

/// Sink that writes each event as a debug-level log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatsSink for LogSink {
    fn record(&self, event: &DecisionEvent) -> Result<(), SinkError> {
        tracing::debug!(
            event_id = %event.event_id,
            kind = ?event.kind,
            rule_id = %event.rule_id,
            latency_us = event.latency.as_micros() as u64,
            cache_hit = event.cache_hit,
            generation = event.generation,
            "decision"
        );
        Ok(())
    }
}

/// Serializable point-in-time view of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub evaluations: u64,
    pub no_match: u64,
    pub rejected: u64,
    pub rule_matches: BTreeMap<String, u64>,
    pub resolutions: u64,
    pub resolutions_defaulted: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
    pub malformed_rules: u64,
    pub sink_failures: u64,
}

/// Process-wide counters shared by the service and the snapshot manager.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    evaluations: AtomicU64,
    no_match: AtomicU64,
    rejected: AtomicU64,
    rule_matches: DashMap<String, u64>,
    resolutions: AtomicU64,
    resolutions_defaulted: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    latency_total_us: AtomicU64,
    latency_max_us: AtomicU64,
    reloads_succeeded: AtomicU64,
    reloads_failed: AtomicU64,
    /// Skipped rules in the latest published snapshot.
    malformed_rules: AtomicU64,
    sink_failures: AtomicU64,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_evaluation(&self, decision: &RoutingDecision, latency: Duration) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
        match decision.matched_rule.as_deref() {
            Some(rule_id) => {
                *self.rule_matches.entry(rule_id.to_string()).or_insert(0) += 1;
                metrics::record_rule_match(rule_id);
            }
            None => {
                self.no_match.fetch_add(1, Ordering::Relaxed);
            }
        }
        if decision.terminal {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }

        let outcome = match (decision.is_match(), decision.terminal) {
            (_, true) => "reject",
            (true, false) => "match",
            (false, false) => "no_match",
        };
        metrics::record_evaluation(outcome, latency);
    }

    /// `level` is `None` when no entry matched and a default was used.
    pub fn record_resolution(&self, level: Option<ScopeLevel>, latency: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        if level.is_none() {
            self.resolutions_defaulted.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(latency);
        metrics::record_resolution(level, latency);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let counter = if hit { &self.cache_hits } else { &self.cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(hit);
    }

    pub fn record_reload(&self, success: bool) {
        let counter = if success {
            &self.reloads_succeeded
        } else {
            &self.reloads_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self, count: usize) {
        self.malformed_rules.store(count as u64, Ordering::Relaxed);
    }

    /// Forward an event to the sink, swallowing any failure.
    pub fn emit(&self, sink: Option<&dyn StatsSink>, event: DecisionEvent) {
        let Some(sink) = sink else {
            return;
        };
        if let Err(e) = sink.record(&event) {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            metrics::record_sink_failure();
            tracing::debug!(event_id = %event.event_id, error = %e, "Stats sink rejected event");
        }
    }

    fn record_latency(&self, latency: Duration) {
        let us = latency.as_micros() as u64;
        self.latency_total_us.fetch_add(us, Ordering::Relaxed);
        self.latency_max_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsReport {
        let evaluations = self.evaluations.load(Ordering::Relaxed);
        let resolutions = self.resolutions.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let calls = evaluations + resolutions;

        StatsReport {
            evaluations,
            no_match: self.no_match.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            rule_matches: self
                .rule_matches
                .iter()
                .map(|r| (r.key().clone(), *r.value()))
                .collect(),
            resolutions,
            resolutions_defaulted: self.resolutions_defaulted.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_ratio: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            avg_latency_us: if calls == 0 {
                0
            } else {
                self.latency_total_us.load(Ordering::Relaxed) / calls
            },
            max_latency_us: self.latency_max_us.load(Ordering::Relaxed),
            reloads_succeeded: self.reloads_succeeded.load(Ordering::Relaxed),
            reloads_failed: self.reloads_failed.load(Ordering::Relaxed),
            malformed_rules: self.malformed_rules.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NO_MATCH;
    use std::sync::Mutex;

    struct FailingSink;

    impl StatsSink for FailingSink {
        fn record(&self, _event: &DecisionEvent) -> Result<(), SinkError> {
            Err(SinkError("queue full".into()))
        }
    }

    #[derive(Default)]
    struct CapturingSink(Mutex<Vec<DecisionEvent>>);

    impl StatsSink for CapturingSink {
        fn record(&self, event: &DecisionEvent) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn test_counts_and_ratio() {
        let stats = StatisticsCollector::new();
        stats.record_evaluation(&RoutingDecision::for_rule("R1", 1), Duration::from_micros(10));
        stats.record_evaluation(&RoutingDecision::for_rule("R1", 1), Duration::from_micros(30));
        stats.record_evaluation(&RoutingDecision::default_route("X", 1), Duration::from_micros(20));
        stats.record_resolution(None, Duration::from_micros(40));
        stats.record_cache_lookup(true);
        stats.record_cache_lookup(false);
        stats.record_cache_lookup(false);
        stats.record_cache_lookup(true);

        let report = stats.snapshot();
        assert_eq!(report.evaluations, 3);
        assert_eq!(report.no_match, 1);
        assert_eq!(report.rule_matches["R1"], 2);
        assert_eq!(report.resolutions_defaulted, 1);
        assert_eq!(report.cache_hit_ratio, 0.5);
        assert_eq!(report.avg_latency_us, 25);
        assert_eq!(report.max_latency_us, 40);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let stats = StatisticsCollector::new();
        let event = DecisionEvent::new(EventKind::Route, NO_MATCH, Duration::ZERO, false, 1);
        stats.emit(Some(&FailingSink), event.clone());
        stats.emit(None, event);
        assert_eq!(stats.snapshot().sink_failures, 1);
    }

    #[test]
    fn test_events_reach_sink() {
        let stats = StatisticsCollector::new();
        let sink = CapturingSink::default();
        let first = DecisionEvent::new(EventKind::Route, "R1", Duration::from_micros(5), true, 3);
        let second = DecisionEvent::new(
            EventKind::Setting { name: "fraud-check-enabled".into() },
            NO_MATCH,
            Duration::from_micros(5),
            false,
            3,
        );
        stats.emit(Some(&sink), first);
        stats.emit(Some(&sink), second);

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].event_id, events[1].event_id);

        let json = serde_json::to_value(&events[1]).unwrap();
        assert_eq!(json["kind"]["type"], "setting");
        assert_eq!(json["rule_id"], "no-match");
        assert_eq!(json["latency_us"], 5);
    }
}
