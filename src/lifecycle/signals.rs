//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP requests a snapshot reload, not shutdown
//! - A handler that cannot be registered is logged and skipped

use crate::lifecycle::Shutdown;
use crate::snapshot::{ReloadHandle, ReloadReason};

/// Listen until a termination signal (or an external shutdown), then trigger shutdown.
pub async fn listen(shutdown: Shutdown, reload: ReloadHandle) {
    let mut stop = shutdown.subscribe();
    if shutdown.is_triggered() {
        return;
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let register = |kind: SignalKind, name: &str| match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "Cannot register signal handler");
                None
            }
        };
        let mut hangup = register(SignalKind::hangup(), "SIGHUP");
        let mut terminate = register(SignalKind::terminate(), "SIGTERM");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("SIGINT received");
                    break;
                }
                Some(()) = next(&mut terminate) => {
                    tracing::info!("SIGTERM received");
                    break;
                }
                Some(()) = next(&mut hangup) => {
                    tracing::info!("SIGHUP received, requesting reload");
                    reload.request(ReloadReason::Signal);
                }
                _ = stop.recv() => return,
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = &reload;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl-C received"),
            _ = stop.recv() => return,
        }
    }

    shutdown.trigger();
}

#[cfg(unix)]
async fn next(stream: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}
