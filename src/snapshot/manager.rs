//! Snapshot ownership and atomic publication.
//!
//! # Responsibilities
//! - Build the next snapshot from the store and validate it
//! - Publish it with a single reference swap
//! - Keep the previous snapshot when a load fails
//! - Never let an older store read replace a newer one
//!
//! # Design Decisions
//! - Readers call `current()` and keep that `Arc` for the whole evaluation
//! - The publish lock covers the generation bump and swap only, never the load
//! - Each load takes a ticket before reading the store; a build whose ticket is
//!   older than the last published one is discarded as `LoadError::Superseded`
//! - Generation numbers are strictly increasing; 0 is the empty startup snapshot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::LoadError;
use crate::observability::metrics;
use crate::observability::stats::StatisticsCollector;
use crate::snapshot::reload::ReloadReason;
use crate::snapshot::state::Snapshot;
use crate::snapshot::store::StoreAdapter;

/// Summary of a successful reload.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub generation: u64,
    pub reason: ReloadReason,
    pub rules_active: usize,
    pub rules_skipped: usize,
    pub configurations: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Owns the published snapshot.
pub struct SnapshotManager {
    store: Arc<dyn StoreAdapter>,
    current: ArcSwap<Snapshot>,
    load_tickets: AtomicU64,
    /// Ticket of the last published load; doubles as the publish lock.
    published_ticket: Mutex<u64>,
    generation_tx: watch::Sender<u64>,
    stats: Arc<StatisticsCollector>,
}

impl SnapshotManager {
    /// Start with the empty generation-0 snapshot; call `reload` to load the store.
    pub fn new(store: Arc<dyn StoreAdapter>, stats: Arc<StatisticsCollector>) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            store,
            current: ArcSwap::from_pointee(Snapshot::empty()),
            load_tickets: AtomicU64::new(0),
            published_ticket: Mutex::new(0),
            generation_tx,
            stats,
        }
    }

    /// The published snapshot. Hold the returned `Arc` for the whole evaluation.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Receives each newly published generation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn StoreAdapter> {
        &self.store
    }

    /// Load, validate and publish a new snapshot.
    ///
    /// Blocking: performs store I/O. On failure the current snapshot is kept.
    /// Returns `LoadError::Superseded` when a load that started later has
    /// already published.
    pub fn reload(&self, reason: ReloadReason) -> Result<ReloadReport, LoadError> {
        let started = Instant::now();
        let ticket = self.load_tickets.fetch_add(1, Ordering::AcqRel) + 1;
        let built = self
            .store
            .load_all()
            .and_then(|doc| Snapshot::build(0, doc.rules, doc.configurations));

        let snapshot = match built {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(
                    reason = %reason,
                    error = %e,
                    generation = self.generation(),
                    "Snapshot reload failed; keeping current snapshot"
                );
                self.stats.record_reload(false);
                metrics::record_reload(false);
                return Err(e);
            }
        };

        let (report, published) = match self.publish(snapshot, ticket, reason, started) {
            Ok(published) => published,
            Err(e) => {
                tracing::info!(reason = %reason, ticket, error = %e, "Discarded snapshot from an older store read");
                return Err(e);
            }
        };

        for warning in published.warnings() {
            tracing::warn!(
                rule_id = %warning.rule_id,
                reason = %warning.reason,
                "Malformed rule skipped"
            );
        }

        self.stats.record_reload(true);
        self.stats.record_malformed(report.rules_skipped);
        metrics::record_reload(true);
        metrics::record_generation(report.generation);

        tracing::info!(
            generation = report.generation,
            reason = %reason,
            rules_active = report.rules_active,
            rules_skipped = report.rules_skipped,
            configurations = report.configurations,
            duration_ms = report.duration.as_millis() as u64,
            "Snapshot published"
        );
        Ok(report)
    }

    fn publish(
        &self,
        snapshot: Snapshot,
        ticket: u64,
        reason: ReloadReason,
        started: Instant,
    ) -> Result<(ReloadReport, Arc<Snapshot>), LoadError> {
        let mut published_ticket = self.published_ticket.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.current.load().generation();
        if ticket < *published_ticket {
            return Err(LoadError::Superseded { generation });
        }
        *published_ticket = ticket;

        let snapshot = Arc::new(snapshot.with_generation(generation + 1));
        let report = ReloadReport {
            generation: generation + 1,
            reason,
            rules_active: snapshot.rules().len(),
            rules_skipped: snapshot.warnings().len(),
            configurations: snapshot.configuration_count(),
            duration: started.elapsed(),
        };

        self.current.store(snapshot.clone());
        self.generation_tx.send_replace(generation + 1);
        Ok((report, snapshot))
    }
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, RoutingRule, ScopedConfiguration};
    use crate::snapshot::store::{InMemoryStore, StoreDocument};
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::thread;

    /// Store whose first read parks until released.
    struct GatedStore {
        inner: InMemoryStore,
        first: AtomicBool,
        read_done: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl StoreAdapter for GatedStore {
        fn load_rules(&self) -> Result<Vec<RoutingRule>, LoadError> {
            self.inner.load_rules()
        }

        fn load_configurations(&self) -> Result<Vec<ScopedConfiguration>, LoadError> {
            self.inner.load_configurations()
        }

        fn load_all(&self) -> Result<StoreDocument, LoadError> {
            let doc = self.inner.load_all()?;
            if self.first.swap(false, Ordering::SeqCst) {
                self.read_done.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(doc)
        }
    }

    fn manager(store: Arc<InMemoryStore>) -> SnapshotManager {
        SnapshotManager::new(store, Arc::new(StatisticsCollector::new()))
    }

    #[test]
    fn test_reload_bumps_generation() {
        let store = Arc::new(InMemoryStore::new(
            vec![RoutingRule::new("R1", 1).then(Action::set_route("A"))],
            Vec::new(),
        ));
        let manager = manager(store.clone());
        assert_eq!(manager.generation(), 0);

        let report = manager.reload(ReloadReason::Startup).unwrap();
        assert_eq!(report.generation, 1);
        assert_eq!(report.rules_active, 1);

        let report = manager.reload(ReloadReason::Requested).unwrap();
        assert_eq!(report.generation, 2);
        assert_eq!(*manager.subscribe().borrow(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let store = Arc::new(InMemoryStore::new(
            vec![RoutingRule::new("R1", 1).then(Action::set_route("A"))],
            Vec::new(),
        ));
        let manager = manager(store.clone());
        manager.reload(ReloadReason::Startup).unwrap();
        let before = manager.current();

        store.replace_rules(vec![RoutingRule::new("dup", 1), RoutingRule::new("dup", 2)]);
        assert!(manager.reload(ReloadReason::Requested).is_err());

        let after = manager.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.rule("R1").is_some());
    }

    #[test]
    fn test_held_snapshot_survives_reload() {
        let store = Arc::new(InMemoryStore::new(
            vec![RoutingRule::new("R1", 1).then(Action::set_route("A"))],
            Vec::new(),
        ));
        let manager = manager(store.clone());
        manager.reload(ReloadReason::Startup).unwrap();

        let held = manager.current();
        store.replace_rules(Vec::new());
        manager.reload(ReloadReason::Requested).unwrap();

        assert_eq!(held.generation(), 1);
        assert!(held.rule("R1").is_some());
        assert!(manager.current().rules().is_empty());
    }

    #[test]
    fn test_older_read_never_replaces_newer() {
        let (read_tx, read_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(GatedStore {
            inner: InMemoryStore::new(
                vec![RoutingRule::new("OLD", 1).then(Action::set_route("A"))],
                Vec::new(),
            ),
            first: AtomicBool::new(true),
            read_done: Mutex::new(read_tx),
            release: Mutex::new(release_rx),
        });
        let stats = Arc::new(StatisticsCollector::new());
        let manager = Arc::new(SnapshotManager::new(store.clone(), stats.clone()));

        let slow = {
            let manager = manager.clone();
            thread::spawn(move || manager.reload(ReloadReason::Periodic))
        };
        read_rx.recv().unwrap();

        store
            .inner
            .replace_rules(vec![RoutingRule::new("NEW", 1).then(Action::set_route("B"))]);
        let fresh = manager.reload(ReloadReason::Requested).unwrap();
        assert_eq!(fresh.generation, 1);

        release_tx.send(()).unwrap();
        let stale = slow.join().unwrap();
        assert!(matches!(stale, Err(LoadError::Superseded { generation: 1 })));

        let current = manager.current();
        assert_eq!(current.generation(), 1);
        assert!(current.rule("NEW").is_some());
        assert!(current.rule("OLD").is_none());
        assert_eq!(stats.snapshot().reloads_failed, 0);
    }
}
