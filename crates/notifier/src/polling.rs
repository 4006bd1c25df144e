//! Periodic cycle driver
//!
//! Cycles never overlap: the next one is scheduled only after the previous one
//! returned, `poll_interval` after a success and `poll_interval_when_error`
//! after a failure. Closing lets an in-flight cycle finish.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One unit of periodic work
#[async_trait]
pub trait CycleExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
struct PollingStats {
    cycles: AtomicU64,
    failures: AtomicU64,
}

/// Scheduler running a [`CycleExecutor`] until closed
pub struct PollingHandler {
    executor: Arc<dyn CycleExecutor>,
    poll_interval: Duration,
    poll_interval_when_error: Duration,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<PollingStats>,
}

impl PollingHandler {
    pub fn new(
        executor: Arc<dyn CycleExecutor>,
        poll_interval: Duration,
        poll_interval_when_error: Duration,
    ) -> anyhow::Result<Self> {
        if poll_interval.is_zero() || poll_interval_when_error.is_zero() {
            anyhow::bail!("polling intervals must be positive");
        }

        Ok(Self {
            executor,
            poll_interval,
            poll_interval_when_error,
            shutdown_tx: Mutex::new(None),
            handle: Mutex::new(None),
            stats: Arc::new(PollingStats::default()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the polling loop; the first cycle runs immediately
    pub fn start(&self) -> anyhow::Result<()> {
        let mut handle_slot = self.handle.lock();
        if handle_slot.is_some() {
            anyhow::bail!("{} polling already started", self.executor.name());
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let executor = Arc::clone(&self.executor);
        let stats = Arc::clone(&self.stats);
        let poll_interval = self.poll_interval;
        let poll_interval_when_error = self.poll_interval_when_error;

        let handle = tokio::spawn(async move {
            info!(
                name = executor.name(),
                interval = ?poll_interval,
                interval_when_error = ?poll_interval_when_error,
                "polling started"
            );

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let start = Instant::now();
                let wait = match executor.execute().await {
                    Ok(()) => {
                        debug!(name = executor.name(), elapsed = ?start.elapsed(), "cycle succeeded");
                        poll_interval
                    }
                    Err(e) => {
                        stats.failures.fetch_add(1, Ordering::Relaxed);
                        let reason = format!("{:#}", e);
                        warn!(name = executor.name(), error = %reason, "cycle failed");
                        poll_interval_when_error
                    }
                };
                stats.cycles.fetch_add(1, Ordering::Relaxed);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!(name = executor.name(), "polling stopped");
        });

        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *handle_slot = Some(handle);
        Ok(())
    }

    /// Stop scheduling cycles and wait for the loop to exit
    pub async fn close(&self) -> anyhow::Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            let _ = shutdown_tx.send(true);
        }
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.await.map_err(|e| {
                error!(name = self.executor.name(), error = %e, "polling task failed");
                anyhow::anyhow!("{} polling task failed: {}", self.executor.name(), e)
            }),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> PollingHandlerStats {
        PollingHandlerStats {
            cycles: self.stats.cycles.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about polling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollingHandlerStats {
    pub cycles: u64,
    pub failures: u64,
}
