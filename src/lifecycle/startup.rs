//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, service and snapshot manager from configuration
//! - Load the first snapshot before anything is served
//! - Start background tasks (reloader, store watcher, cache janitor, signals)
//!
//! # Design Decisions
//! - Fail fast: the first snapshot load is fatal, later ones are not
//! - A store watch that cannot start degrades to periodic reload
//! - Every task exits on the shared shutdown signal

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::LoadError;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::LogSink;
use crate::service::DecisionService;
use crate::snapshot::{FileStore, ReloadHandle, ReloadReason, Reloader, StoreAdapter, StoreWatch};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("initial snapshot load failed: {0}")]
    InitialLoad(#[from] LoadError),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A running engine and its background tasks.
pub struct Engine {
    pub service: Arc<DecisionService>,
    pub shutdown: Shutdown,
    pub reload: ReloadHandle,
    tasks: Vec<JoinHandle<()>>,
    _watch: Option<StoreWatch>,
}

impl Engine {
    /// Wait for shutdown, then for every background task to finish.
    pub async fn wait(self) {
        let mut stop = self.shutdown.subscribe();
        if !self.shutdown.is_triggered() {
            let _ = stop.recv().await;
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Engine stopped");
    }
}

/// Start an engine over the configured file store.
pub async fn bootstrap(config: &EngineConfig) -> Result<Engine, StartupError> {
    let store: Arc<dyn StoreAdapter> = Arc::new(FileStore::new(&config.store.path));
    start(store, config, true).await
}

/// Start an engine over any store. `listen_signals` wires OS signals to shutdown and reload.
pub async fn start(
    store: Arc<dyn StoreAdapter>,
    config: &EngineConfig,
    listen_signals: bool,
) -> Result<Engine, StartupError> {
    let service = Arc::new(DecisionService::new(store, config).with_sink(Arc::new(LogSink)));

    let manager = service.snapshots().clone();
    let report = tokio::task::spawn_blocking(move || manager.reload(ReloadReason::Startup)).await??;
    tracing::info!(
        generation = report.generation,
        rules = report.rules_active,
        configurations = report.configurations,
        "Initial snapshot loaded"
    );

    let shutdown = Shutdown::new();
    let reloader = Reloader::new(service.snapshots().clone(), config.reload.clone());
    let reload = reloader.handle();

    let watch = if config.store.watch {
        match service.snapshots().store().watch(reload.clone()) {
            Ok(watch) => watch,
            Err(e) => {
                tracing::warn!(error = %e, "Store watch unavailable; relying on periodic reload");
                None
            }
        }
    } else {
        None
    };

    let mut tasks = vec![
        tokio::spawn(reloader.run(shutdown.subscribe())),
        tokio::spawn(cache_janitor(
            service.clone(),
            Duration::from_secs(config.cache.ttl_secs.max(1)),
            shutdown.clone(),
        )),
    ];
    if listen_signals {
        tasks.push(tokio::spawn(signals::listen(shutdown.clone(), reload.clone())));
    }

    Ok(Engine {
        service,
        shutdown,
        reload,
        tasks,
        _watch: watch,
    })
}

/// Drop stale generations after each publish and expired entries every `sweep`.
async fn cache_janitor(service: Arc<DecisionService>, sweep: Duration, shutdown: Shutdown) {
    let mut generations = service.snapshots().subscribe();
    let mut stop = shutdown.subscribe();
    if shutdown.is_triggered() {
        return;
    }
    let mut ticker = tokio::time::interval(sweep);

    loop {
        tokio::select! {
            changed = generations.changed() => {
                if changed.is_err() {
                    break;
                }
                let generation = *generations.borrow_and_update();
                service.cache().purge_stale(generation);
            }
            _ = ticker.tick() => {
                let removed = service.cache().purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Expired cache entries swept");
                }
            }
            _ = stop.recv() => break,
        }
    }
}
