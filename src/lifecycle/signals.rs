//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - One task owns every handler; components only see [`Shutdown`] and the
//!   reload channel
//! - Repeated SIGTERM/SIGINT escalate through the shutdown trigger count
//! - SIGHUP triggers a provider reload, not shutdown

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Spawn the signal listener.
pub fn spawn(shutdown: Shutdown, reload: broadcast::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(listen(shutdown, reload))
}

#[cfg(unix)]
async fn listen(shutdown: Shutdown, reload: broadcast::Sender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut int, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
        (term, int, hup) => {
            let error = [term.err(), int.err(), hup.err()].into_iter().flatten().next();
            tracing::error!(error = ?error, "Failed to install signal handlers");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = term.recv() => {
                tracing::info!(signal = "SIGTERM", "Termination signal received");
                shutdown.trigger();
            }
            _ = int.recv() => {
                tracing::info!(signal = "SIGINT", "Termination signal received");
                shutdown.trigger();
            }
            _ = hup.recv() => {
                tracing::info!(signal = "SIGHUP", "Reload signal received");
                let _ = reload.send(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn listen(shutdown: Shutdown, _reload: broadcast::Sender<()>) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        tracing::info!(signal = "ctrl-c", "Termination signal received");
        shutdown.trigger();
    }
}
