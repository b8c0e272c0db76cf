//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use payment_rules_engine::config::{EngineConfig, ReloadConfig};
use payment_rules_engine::error::LoadError;
use payment_rules_engine::model::{
    Action, Condition, RoutingRule, ScopeKey, ScopeLevel, ScopedConfiguration,
};
use payment_rules_engine::snapshot::{
    InMemoryStore, SnapshotManager, StoreAdapter, StoreDocument,
};
use payment_rules_engine::DecisionService;

/// R1: amount > 1000 → HIGH_VALUE (priority 10); R2: always → DEFAULT (priority 20).
#[allow(dead_code)]
pub fn scenario_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new("R1", 10)
            .when(Condition::new("amount", "greater_than", 1000))
            .then(Action::set_route("HIGH_VALUE")),
        RoutingRule::new("R2", 20).then(Action::set_route("DEFAULT")),
    ]
}

/// tenant-A → true at tenant level, tenant-A/SWIFT → false at clearing-system level.
#[allow(dead_code)]
pub fn fraud_entries() -> Vec<ScopedConfiguration> {
    vec![
        ScopedConfiguration::new(
            "fraud-check-enabled",
            ScopeLevel::Tenant,
            ScopeKey::new("tenant-A"),
            true,
        ),
        ScopedConfiguration::new(
            "fraud-check-enabled",
            ScopeLevel::ClearingSystem,
            ScopeKey::qualified("tenant-A", "SWIFT"),
            false,
        ),
    ]
}

/// Service over an in-memory store with the first snapshot already loaded.
#[allow(dead_code)]
pub fn loaded_service(store: Arc<InMemoryStore>, config: &EngineConfig) -> DecisionService {
    let service = DecisionService::new(store, config);
    service.reload().unwrap();
    service
}

#[allow(dead_code)]
pub fn fast_reload() -> ReloadConfig {
    ReloadConfig {
        interval_secs: 0,
        max_attempts: 3,
        base_delay_ms: 5,
        max_delay_ms: 20,
    }
}

/// Store that fails a configurable number of loads before delegating.
#[derive(Default)]
#[allow(dead_code)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failures: AtomicU32,
    loads: AtomicU32,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(0),
            loads: AtomicU32::new(0),
        }
    }

    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

impl StoreAdapter for FlakyStore {
    fn load_rules(&self) -> Result<Vec<RoutingRule>, LoadError> {
        Ok(self.load_all()?.rules)
    }

    fn load_configurations(&self) -> Result<Vec<ScopedConfiguration>, LoadError> {
        Ok(self.load_all()?.configurations)
    }

    fn load_all(&self) -> Result<StoreDocument, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LoadError::Unavailable("injected store outage".into()));
        }
        self.inner.load_all()
    }
}

/// Wait until the manager publishes at least `generation`.
#[allow(dead_code)]
pub async fn wait_for_generation(manager: &SnapshotManager, generation: u64, timeout: Duration) -> bool {
    let mut rx = manager.subscribe();
    tokio::time::timeout(timeout, rx.wait_for(|g| *g >= generation))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
#[allow(dead_code)]
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
