//! Generation-tagged concurrent decision cache.
//!
//! At capacity, a miss may trigger one sweep of stale and expired entries,
//! but only once per generation change or per `SWEEP_INTERVAL`; otherwise
//! the insert is refused straight away.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::model::{RequestContext, RoutingDecision, RuleCategory};
use crate::resolution::Resolution;

/// Minimum spacing of capacity sweeps within one generation.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const NEVER_SWEPT: u64 = u64::MAX;

/// What a cached result answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Routing,
    Category(RuleCategory),
    Setting(String),
}

/// Composite lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub generation: u64,
    pub kind: CacheKind,
    pub tenant: Option<String>,
    pub payment_type: Option<String>,
    pub local_instrument: Option<String>,
    pub clearing_system: Option<String>,
    /// Hash of the canonical attribute fingerprint; 0 for settings.
    pub context_hash: u64,
}

impl CacheKey {
    /// Key plus the fingerprint to compare on hit.
    ///
    /// Settings ignore attributes, so their fingerprint is empty and hash 0.
    pub fn new(
        generation: u64,
        kind: CacheKind,
        ctx: &RequestContext,
    ) -> Result<(Self, String), CacheError> {
        let (context_hash, fingerprint) = match kind {
            CacheKind::Setting(_) => (0, String::new()),
            CacheKind::Routing | CacheKind::Category(_) => {
                let fingerprint = fingerprint(&ctx.attributes)?;
                let mut hasher = DefaultHasher::new();
                fingerprint.hash(&mut hasher);
                (hasher.finish(), fingerprint)
            }
        };
        let key = Self {
            generation,
            kind,
            tenant: ctx.tenant.clone(),
            payment_type: ctx.payment_type.clone(),
            local_instrument: ctx.local_instrument.clone(),
            clearing_system: ctx.clearing_system.clone(),
            context_hash,
        };
        Ok((key, fingerprint))
    }
}

/// Cached result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Decision(RoutingDecision),
    /// `None` records that nothing in the snapshot matched.
    Setting(Option<Resolution>),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    fingerprint: String,
    expires_at: Instant,
}

/// Thread-safe cache shared by all evaluations.
#[derive(Clone)]
pub struct DecisionCache {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
    /// Latest generation seen; older entries are garbage.
    generation: Arc<AtomicU64>,
    /// Capacity sweep bookkeeping: generation and time (ms since `created`) of the last one.
    swept_generation: Arc<AtomicU64>,
    last_sweep_ms: Arc<AtomicU64>,
    sweeps: Arc<AtomicU64>,
    created: Instant,
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
}

impl DecisionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            swept_generation: Arc::new(AtomicU64::new(0)),
            last_sweep_ms: Arc::new(AtomicU64::new(NEVER_SWEPT)),
            sweeps: Arc::new(AtomicU64::new(0)),
            created: Instant::now(),
            enabled: config.enabled,
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(&CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a live entry whose fingerprint matches.
    pub fn get(&self, key: &CacheKey, fingerprint: &str) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }
        let expired = {
            let entry = self.inner.get(key)?;
            if entry.expires_at > Instant::now() {
                if entry.fingerprint != fingerprint {
                    tracing::trace!(hash = key.context_hash, "Cache fingerprint collision");
                    return None;
                }
                return Some(entry.value.clone());
            }
            true
        };
        if expired {
            self.inner.remove_if(key, |_, e| e.expires_at <= Instant::now());
        }
        None
    }

    /// Store a result valid for at most the TTL, and never past `valid_for`.
    pub fn insert(
        &self,
        key: CacheKey,
        fingerprint: String,
        value: CachedValue,
        valid_for: Option<Duration>,
    ) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        let lifetime = valid_for.map_or(self.ttl, |limit| limit.min(self.ttl));
        if lifetime.is_zero() {
            return Ok(());
        }

        self.generation.fetch_max(key.generation, Ordering::AcqRel);
        if self.inner.len() >= self.max_entries && !self.inner.contains_key(&key) {
            if self.begin_sweep() {
                self.purge_stale(self.generation.load(Ordering::Acquire));
                self.purge_expired();
            }
            if self.inner.len() >= self.max_entries {
                return Err(CacheError::Full(self.max_entries));
            }
        }

        self.inner.insert(
            key,
            CacheEntry {
                value,
                fingerprint,
                expires_at: Instant::now() + lifetime,
            },
        );
        Ok(())
    }

    /// Claim the next capacity sweep if one is due. Only one caller wins.
    fn begin_sweep(&self) -> bool {
        let generation = self.generation.load(Ordering::Acquire);
        let now_ms = self.created.elapsed().as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        let advanced = self.swept_generation.load(Ordering::Acquire) < generation;
        let due = last == NEVER_SWEPT || now_ms.saturating_sub(last) >= SWEEP_INTERVAL.as_millis() as u64;
        if !advanced && !due {
            return false;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.swept_generation.fetch_max(generation, Ordering::AcqRel);
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Number of capacity sweeps run by `insert` so far.
    pub fn capacity_sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Drop every entry from an older generation. Returns the number removed.
    pub fn purge_stale(&self, generation: u64) -> usize {
        self.generation.fetch_max(generation, Ordering::AcqRel);
        let before = self.inner.len();
        self.inner.retain(|key, _| key.generation >= generation);
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            tracing::debug!(generation, removed, "Purged stale cache entries");
        }
        removed
    }

    /// Drop entries past their expiry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl std::fmt::Debug for DecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.inner.len())
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

/// Key-sorted JSON text of the attributes, independent of insertion order.
fn fingerprint(attributes: &Map<String, Value>) -> Result<String, CacheError> {
    Ok(serde_json::to_string(&canonical_map(attributes))?)
}

fn canonical_map(map: &Map<String, Value>) -> Value {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    let sorted: Map<String, Value> = keys
        .into_iter()
        .map(|k| (k.clone(), canonical(&map[k.as_str()])))
        .collect();
    Value::Object(sorted)
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => canonical_map(map),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
