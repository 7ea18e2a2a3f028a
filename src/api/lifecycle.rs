//! Background work that runs next to the HTTP listener: the periodic ledger
//! sweep, OS signal handling and the shutdown deadline.

use crate::registry::{unix_now, Registry};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

/// Interval between two expiry sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Time in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Sweep every channel and log how many entries were dropped.
pub fn sweep_now(registry: &Registry) -> usize {
    let removed = registry.sweep(unix_now());
    info!("Expiry sweep removed {} entries", removed);
    removed
}

/// Periodic sweep, stops when shutdown is signalled.
pub fn spawn_sweeper(
    registry: Arc<Registry>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    sweep_now(&registry);
                }
                () = wait_for_shutdown(shutdown.clone()) => {
                    debug!("sweeper stopped");
                    break;
                }
            }
        }
    })
}

/// Resolves once shutdown has been requested (or the sender is gone).
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Resolves `grace` after shutdown has been requested.
pub async fn shutdown_deadline(shutdown: watch::Receiver<bool>, grace: Duration) {
    wait_for_shutdown(shutdown).await;
    tokio::time::sleep(grace).await;
}

/// Listen for SIGHUP (sweep), SIGTERM and SIGINT (graceful shutdown).
///
/// A second SIGINT while shutdown is pending terminates the process.
///
/// # Errors
/// Returns an error if a signal handler can't be registered
#[cfg(unix)]
pub fn spawn_signals(
    registry: Arc<Registry>,
    shutdown: watch::Sender<bool>,
) -> Result<JoinHandle<()>> {
    use anyhow::Context;
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, sweeping expired entries");
                    sweep_now(&registry);
                }
                _ = terminate.recv() => {
                    info!("SIGTERM received, shutting down");
                    shutdown.send_replace(true);
                }
                _ = interrupt.recv() => {
                    if shutdown.send_replace(true) {
                        warn!("Second interrupt received, exiting now");
                        std::process::exit(130);
                    }
                    info!("Interrupt received, shutting down (press Ctrl-C again to force)");
                }
            }
        }
    }))
}

/// Ctrl-C triggers graceful shutdown, a second one terminates the process.
///
/// # Errors
/// Never fails on this target
#[cfg(not(unix))]
pub fn spawn_signals(
    _registry: Arc<Registry>,
    shutdown: watch::Sender<bool>,
) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if shutdown.send_replace(true) {
                warn!("Second interrupt received, exiting now");
                std::process::exit(130);
            }
            info!("Interrupt received, shutting down (press Ctrl-C again to force)");
        }
    }))
}
