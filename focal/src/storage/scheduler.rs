//! Periodic retention cleanup across collection stores

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::collection::CollectionStore;
use super::errors::StoreResult;
use super::traits::Record;

/// Something whose expired records can be removed
#[async_trait]
pub trait Cleanable: Send + Sync {
    fn name(&self) -> &str;

    /// Remove expired records, returning how many were removed
    async fn cleanup(&self) -> StoreResult<usize>;
}

#[async_trait]
impl<T: Record> Cleanable for CollectionStore<T> {
    fn name(&self) -> &str {
        T::COLLECTION
    }

    async fn cleanup(&self) -> StoreResult<usize> {
        CollectionStore::cleanup(self).await
    }
}

/// Notified after every scheduled pass
#[async_trait]
pub trait CleanupListener: Send + Sync {
    async fn on_cleanup(&self, report: &CleanupReport);
}

/// Totals of one cleanup pass over every target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    /// Names of targets whose cleanup failed
    pub failed: Vec<String>,
}

/// Background task running [`Cleanable::cleanup`] on every target at a fixed
/// interval. Individual failures are already reported by the stores; the
/// task keeps running regardless.
#[derive(Debug)]
pub struct CleanupScheduler {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawn the task on the current runtime. The first pass runs after
    /// `initial_delay`, later passes every `interval`. `listener` sees the
    /// report of each pass.
    pub fn spawn(
        targets: Vec<Arc<dyn Cleanable>>,
        interval: Duration,
        initial_delay: Duration,
        listener: Option<Arc<dyn CleanupListener>>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(
                "Cleanup task started (targets: {}, interval: {:?}, initial delay: {:?})",
                targets.len(),
                interval,
                initial_delay
            );

            let start = tokio::time::Instant::now() + initial_delay;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = Self::run_once(&targets).await;
                        tracing::debug!(
                            "Cleanup pass removed {} records ({} failed targets)",
                            report.removed,
                            report.failed.len()
                        );
                        if let Some(listener) = &listener {
                            listener.on_cleanup(&report).await;
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        tracing::info!("Cleanup task shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// One cleanup pass over `targets`, in order
    pub async fn run_once(targets: &[Arc<dyn Cleanable>]) -> CleanupReport {
        let mut report = CleanupReport::default();
        for target in targets {
            match target.cleanup().await {
                Ok(removed) => report.removed += removed,
                Err(_) => report.failed.push(target.name().to_string()),
            }
        }
        report
    }

    /// Stop the task and wait for an in-flight pass to finish
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Cleanup task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
