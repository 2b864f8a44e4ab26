//! Periodic reconciliation sweep

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::scanner::ReconciliationScanner;

struct RunningSweep {
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs a quiet scan on a fixed interval until disabled
pub struct PeriodicSweep {
    scanner: Arc<ReconciliationScanner>,
    running: Mutex<Option<RunningSweep>>,
}

impl PeriodicSweep {
    pub(crate) fn new(scanner: Arc<ReconciliationScanner>) -> Self {
        Self {
            scanner,
            running: Mutex::new(None),
        }
    }

    /// Start sweeping every `interval`, replacing any running sweep.
    /// A zero interval only stops the current sweep.
    pub fn enable(&self, interval: Duration) {
        self.disable();
        if interval.is_zero() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let scanner = Arc::clone(&self.scanner);
        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Periodic sweep started");
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Periodic sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = scanner.scan_all(false).await {
                            warn!(error = %e, "Periodic sweep failed");
                        }
                    }
                }
            }
        });

        *self.running.lock() = Some(RunningSweep {
            interval,
            shutdown_tx,
            handle,
        });
    }

    /// Stop the running sweep, if any
    pub fn disable(&self) {
        if let Some(running) = self.running.lock().take() {
            // The task may already be gone
            let _ = running.shutdown_tx.send(());
            drop(running.handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Interval of the running sweep
    pub fn interval(&self) -> Option<Duration> {
        self.running.lock().as_ref().map(|running| running.interval)
    }
}

impl Drop for PeriodicSweep {
    fn drop(&mut self) {
        self.disable();
    }
}
