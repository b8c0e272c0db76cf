//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rules_engine_evaluations_total` (counter): routing calls by outcome (match, no_match, reject)
//! - `rules_engine_rule_matches_total` (counter): matches by rule id
//! - `rules_engine_resolutions_total` (counter): setting lookups by winning level or `default`
//! - `rules_engine_cache_lookups_total` (counter): cache lookups by result (hit, miss)
//! - `rules_engine_eval_duration_seconds` (histogram): routing + resolution latency
//! - `rules_engine_snapshot_generation` (gauge): published generation
//! - `rules_engine_reloads_total` (counter): reloads by result (success, failure)
//! - `rules_engine_stats_sink_failures_total` (counter): events a sink refused
//!
//! # Design Decisions
//! - Facade calls are no-ops until `init_metrics` installs the exporter
//! - Rule ids as labels: rule sets are small and curated

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::ScopeLevel;

/// Install the Prometheus exporter with its scrape listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("rules_engine_evaluations_total", "Routing evaluations by outcome");
    describe_counter!("rules_engine_rule_matches_total", "Routing matches by rule");
    describe_counter!("rules_engine_resolutions_total", "Setting resolutions by winning scope level");
    describe_counter!("rules_engine_cache_lookups_total", "Decision cache lookups by result");
    describe_histogram!(
        "rules_engine_eval_duration_seconds",
        Unit::Seconds,
        "Time spent routing or resolving, cache included"
    );
    describe_gauge!("rules_engine_snapshot_generation", "Generation of the published snapshot");
    describe_counter!("rules_engine_reloads_total", "Snapshot reloads by result");
    describe_counter!("rules_engine_stats_sink_failures_total", "Decision events dropped by the sink");
}

pub fn record_evaluation(outcome: &'static str, latency: Duration) {
    counter!("rules_engine_evaluations_total", "outcome" => outcome).increment(1);
    histogram!("rules_engine_eval_duration_seconds", "op" => "route").record(latency.as_secs_f64());
}

pub fn record_rule_match(rule_id: &str) {
    counter!("rules_engine_rule_matches_total", "rule" => rule_id.to_string()).increment(1);
}

/// `level` is `None` when the caller's default was used.
pub fn record_resolution(level: Option<ScopeLevel>, latency: Duration) {
    let level = level.map_or("default", |l| l.as_str());
    counter!("rules_engine_resolutions_total", "level" => level).increment(1);
    histogram!("rules_engine_eval_duration_seconds", "op" => "resolve").record(latency.as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("rules_engine_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_generation(generation: u64) {
    gauge!("rules_engine_snapshot_generation").set(generation as f64);
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("rules_engine_reloads_total", "result" => result).increment(1);
}

pub fn record_sink_failure() {
    counter!("rules_engine_stats_sink_failures_total").increment(1);
}
