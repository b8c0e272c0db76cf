//! Background reload loop.
//!
//! # Responsibilities
//! - Reload on explicit request, store change notification, or a timer
//! - Retry failed reloads with exponential backoff + jitter
//! - Stop cleanly on shutdown, including mid-backoff
//!
//! # Design Decisions
//! - Store I/O runs on the blocking pool, never on the evaluation path
//! - Bursts of triggers are coalesced into one reload
//! - A reload that exhausts its retries is reported and the loop keeps running

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ReloadConfig;
use crate::error::LoadError;
use crate::resilience::backoff::calculate_backoff;
use crate::snapshot::manager::SnapshotManager;

/// Why a reload happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadReason {
    Startup,
    Requested,
    StoreChanged,
    Periodic,
    Signal,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReloadReason::Startup => "startup",
            ReloadReason::Requested => "requested",
            ReloadReason::StoreChanged => "store_changed",
            ReloadReason::Periodic => "periodic",
            ReloadReason::Signal => "signal",
        };
        f.write_str(s)
    }
}

/// Cloneable handle for asking the reloader to run.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::UnboundedSender<ReloadReason>,
}

impl ReloadHandle {
    /// Queue a reload. Returns false once the reloader has stopped.
    pub fn request(&self, reason: ReloadReason) -> bool {
        self.tx.send(reason).is_ok()
    }
}

/// Drives reloads for one `SnapshotManager`.
pub struct Reloader {
    manager: Arc<SnapshotManager>,
    config: ReloadConfig,
    rx: mpsc::UnboundedReceiver<ReloadReason>,
    handle: ReloadHandle,
}

impl Reloader {
    pub fn new(manager: Arc<SnapshotManager>, config: ReloadConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            manager,
            config,
            rx,
            handle: ReloadHandle { tx },
        }
    }

    pub fn handle(&self) -> ReloadHandle {
        self.handle.clone()
    }

    /// Run until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let periodic = self.config.interval_secs > 0;
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            max_attempts = self.config.max_attempts,
            "Reloader started"
        );

        loop {
            let reason = tokio::select! {
                Some(reason) = self.rx.recv() => {
                    let coalesced = self.drain_pending();
                    if coalesced > 0 {
                        tracing::debug!(coalesced, "Coalesced pending reload requests");
                    }
                    reason
                }
                _ = ticker.tick(), if periodic => ReloadReason::Periodic,
                _ = shutdown.recv() => {
                    tracing::info!("Reloader received shutdown signal, exiting loop");
                    break;
                }
            };

            if let Attempt::Cancelled = self.reload_with_retry(reason, &mut shutdown).await {
                break;
            }
        }
    }

    fn drain_pending(&mut self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    async fn reload_with_retry(
        &self,
        reason: ReloadReason,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Attempt {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let manager = self.manager.clone();
            let result = tokio::task::spawn_blocking(move || manager.reload(reason))
                .await
                .unwrap_or_else(|e| Err(LoadError::Unavailable(format!("reload task failed: {}", e))));

            match result {
                Ok(_) => return Attempt::Published,
                Err(LoadError::Superseded { .. }) => return Attempt::Superseded,
                Err(e) if attempt < max_attempts => {
                    let delay = calculate_backoff(attempt, self.config.base_delay_ms, self.config.max_delay_ms);
                    tracing::warn!(attempt, delay = ?delay, error = %e, "Reload failed, retrying");
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown during reload backoff");
                            return Attempt::Cancelled;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(
                        attempts = max_attempts,
                        error = %e,
                        generation = self.manager.generation(),
                        "Reload abandoned; previous snapshot remains active"
                    );
                }
            }
        }
        Attempt::Exhausted
    }
}

enum Attempt {
    Published,
    /// A newer load published first; nothing left to do.
    Superseded,
    Exhausted,
    Cancelled,
}
