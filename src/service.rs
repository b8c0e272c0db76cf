//! Caller-facing decision service.
//!
//! # Responsibilities
//! - `route` / `route_category`: first-match-wins routing decision
//! - `resolve_setting` / `resolve`: most specific setting value
//! - Consult the decision cache, record statistics, emit decision events
//! - Expose on-demand reload for administrative triggers
//!
//! # Data Flow
//! ```text
//! call(ctx)
//!     → pin snapshot (one Arc load per call)
//!     → CacheKey { generation, kind, scope keys, context hash }
//!     → cache hit?  yes → cached value
//!                   no  → RuleEngine / ConfigResolver → cache insert
//!     → StatisticsCollector + StatsSink (fire-and-forget)
//!     → Return: RoutingDecision / value
//! ```
//!
//! # Design Decisions
//! - Synchronous and in-memory; no I/O on the request path
//! - Cache and statistics failures are absorbed, never returned

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::{CacheKey, CacheKind, CachedValue, DecisionCache};
use crate::config::EngineConfig;
use crate::error::{LoadError, ResolveError};
use crate::model::{RequestContext, RoutingDecision, RuleCategory, NO_MATCH};
use crate::observability::stats::{DecisionEvent, EventKind, StatisticsCollector, StatsReport, StatsSink};
use crate::resolution::{ConfigResolver, Resolution, SettingDefaults};
use crate::routing::RuleEngine;
use crate::snapshot::{ReloadReason, ReloadReport, Snapshot, SnapshotManager, StoreAdapter};

/// Routing and setting resolution over the currently published snapshot.
pub struct DecisionService {
    snapshots: Arc<SnapshotManager>,
    cache: DecisionCache,
    stats: Arc<StatisticsCollector>,
    sink: Option<Arc<dyn StatsSink>>,
    default_route: String,
    defaults: SettingDefaults,
}

impl DecisionService {
    /// Build a service over `store`. Nothing is loaded until the first reload.
    pub fn new(store: Arc<dyn StoreAdapter>, config: &EngineConfig) -> Self {
        let stats = Arc::new(StatisticsCollector::new());
        Self {
            snapshots: Arc::new(SnapshotManager::new(store, stats.clone())),
            cache: DecisionCache::new(&config.cache),
            stats,
            sink: None,
            default_route: config.routing.default_route.clone(),
            defaults: SettingDefaults::from(config.settings.defaults.clone()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Routing decision across all rule categories.
    pub fn route(&self, ctx: &RequestContext) -> RoutingDecision {
        self.route_inner(ctx, None)
    }

    /// Routing decision considering only one rule category.
    pub fn route_category(&self, ctx: &RequestContext, category: RuleCategory) -> RoutingDecision {
        self.route_inner(ctx, Some(category))
    }

    /// Value for `setting`, or `default` when nothing is configured for this context.
    pub fn resolve_setting(
        &self,
        setting: &str,
        ctx: &RequestContext,
        default: impl Into<Value>,
    ) -> Result<Value, ResolveError> {
        Ok(self
            .resolution(setting, ctx)?
            .map_or_else(|| default.into(), |r| r.value))
    }

    /// Value for `setting`, falling back to the registered default.
    ///
    /// Fails with `UnknownSetting` when nothing matches and no default is registered.
    pub fn resolve(&self, setting: &str, ctx: &RequestContext) -> Result<Value, ResolveError> {
        match self.resolution(setting, ctx)? {
            Some(resolution) => Ok(resolution.value),
            None => self
                .defaults
                .get(setting)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownSetting(setting.to_string())),
        }
    }

    /// The winning entry for `setting`, with its level and id.
    pub fn resolution(
        &self,
        setting: &str,
        ctx: &RequestContext,
    ) -> Result<Option<Resolution>, ResolveError> {
        let started = Instant::now();
        let snapshot = self.snapshots.current();
        let now = Utc::now();

        let key = self.cache_key(snapshot.generation(), CacheKind::Setting(setting.to_string()), ctx);
        let (resolution, cache_hit) = match self.cache_get(key.as_ref()) {
            Some(CachedValue::Setting(resolution)) => (resolution, true),
            _ => {
                let resolution = ConfigResolver::new(&snapshot).at(now).resolve(setting, ctx)?;
                self.cache_put(&snapshot, key, CachedValue::Setting(resolution.clone()), now);
                (resolution, false)
            }
        };

        let latency = started.elapsed();
        let level = resolution.as_ref().map(|r| r.level);
        self.stats.record_resolution(level, latency);
        self.stats.emit(
            self.sink.as_deref(),
            DecisionEvent::new(
                EventKind::Setting {
                    name: setting.to_string(),
                },
                resolution.as_ref().map_or(NO_MATCH, |r| r.entry_id.as_str()),
                latency,
                cache_hit,
                snapshot.generation(),
            ),
        );
        tracing::trace!(setting, level = ?level, cache_hit, "Setting resolved");
        Ok(resolution)
    }

    /// Reload from the store now and drop cache entries of older generations.
    ///
    /// Blocking: performs store I/O. From async code prefer
    /// `ReloadHandle::request` or `spawn_blocking`.
    /// Fails with `LoadError::Superseded` if a reload that read the store later
    /// published first; the published snapshot is then already newer.
    pub fn reload(&self) -> Result<ReloadReport, LoadError> {
        let report = self.snapshots.reload(ReloadReason::Requested)?;
        self.cache.purge_stale(report.generation);
        Ok(report)
    }

    pub fn stats(&self) -> StatsReport {
        self.stats.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.snapshots.generation()
    }

    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    fn route_inner(&self, ctx: &RequestContext, category: Option<RuleCategory>) -> RoutingDecision {
        let started = Instant::now();
        let snapshot = self.snapshots.current();
        let now = Utc::now();

        let kind = category.map_or(CacheKind::Routing, CacheKind::Category);
        let key = self.cache_key(snapshot.generation(), kind, ctx);
        let (decision, cache_hit) = match self.cache_get(key.as_ref()) {
            Some(CachedValue::Decision(decision)) => (decision, true),
            _ => {
                let engine = RuleEngine::new(&snapshot).at(now);
                let decision = match category {
                    Some(category) => engine.evaluate_category(ctx, category, &self.default_route),
                    None => engine.evaluate(ctx, &self.default_route),
                };
                self.cache_put(&snapshot, key, CachedValue::Decision(decision.clone()), now);
                (decision, false)
            }
        };

        let latency = started.elapsed();
        self.stats.record_evaluation(&decision, latency);
        self.stats.emit(
            self.sink.as_deref(),
            DecisionEvent::new(
                EventKind::Route,
                decision.matched_rule_id(),
                latency,
                cache_hit,
                decision.generation,
            ),
        );
        tracing::trace!(
            rule_id = decision.matched_rule_id(),
            route = ?decision.route,
            terminal = decision.terminal,
            cache_hit,
            "Request routed"
        );
        decision
    }

    fn cache_key(
        &self,
        generation: u64,
        kind: CacheKind,
        ctx: &RequestContext,
    ) -> Option<(CacheKey, String)> {
        if !self.cache.is_enabled() {
            return None;
        }
        match CacheKey::new(generation, kind, ctx) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::debug!(error = %e, "Cache key unavailable, evaluating uncached");
                None
            }
        }
    }

    fn cache_get(&self, key: Option<&(CacheKey, String)>) -> Option<CachedValue> {
        let (key, fingerprint) = key?;
        let value = self.cache.get(key, fingerprint);
        self.stats.record_cache_lookup(value.is_some());
        value
    }

    fn cache_put(
        &self,
        snapshot: &Snapshot,
        key: Option<(CacheKey, String)>,
        value: CachedValue,
        now: DateTime<Utc>,
    ) {
        let Some((key, fingerprint)) = key else {
            return;
        };
        let valid_for = snapshot
            .next_boundary_after(now)
            .map(|boundary| (boundary - now).to_std().unwrap_or(Duration::ZERO));
        if let Err(e) = self.cache.insert(key, fingerprint, value, valid_for) {
            tracing::debug!(error = %e, "Decision not cached");
        }
    }
}

impl std::fmt::Debug for DecisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionService")
            .field("generation", &self.generation())
            .field("cache", &self.cache)
            .field("default_route", &self.default_route)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
